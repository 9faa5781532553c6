pub(crate) mod fetch;

pub(crate) use fetch::fetch;
