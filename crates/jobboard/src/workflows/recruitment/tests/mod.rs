mod common;
mod documents;
mod exemptions;
mod requirements;
