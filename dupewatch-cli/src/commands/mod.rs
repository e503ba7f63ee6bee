pub mod compare;
pub mod fingerprint;
pub mod rank;
pub mod search;
