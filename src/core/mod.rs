pub mod fetcher;
pub mod pipeline;
pub mod query;
pub mod ranker;
pub mod renamer;
pub mod resolver;
pub mod session;
pub mod tagger;
pub mod title;
