pub mod archiver;
pub mod attributes;
pub mod category;
pub mod grouper;
pub mod paths;
pub mod policy;
pub mod pruner;
pub mod removal;
pub mod rules;
pub mod warn;
