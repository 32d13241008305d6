pub mod configuration;
pub mod consts;
pub mod counter;
pub mod errors;
pub mod lexicon;
pub mod logging;
pub mod responses;
pub mod streaming;
pub mod timestamps;
pub mod traces;
