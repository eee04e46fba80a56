mod output;
mod run;
mod store;

pub(crate) use run::run;
