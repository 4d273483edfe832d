pub mod actions;
pub mod catalog;
pub mod config;
pub mod duration;
pub mod error;
pub mod matcher;
pub mod models;
pub mod navigation;
pub mod normalize;
pub mod ordering;
pub mod parse;
pub mod persistence;
pub mod reconcile;
pub mod scanner;
pub mod storage;
