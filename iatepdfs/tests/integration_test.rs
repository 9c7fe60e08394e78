#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/merge.rs"]
mod merge;

#[path = "integration/split.rs"]
mod split;

#[path = "integration/reorder.rs"]
mod reorder;

#[path = "integration/compress.rs"]
mod compress;

#[path = "integration/app_state.rs"]
mod app_state;

#[path = "integration/encrypted.rs"]
mod encrypted;
