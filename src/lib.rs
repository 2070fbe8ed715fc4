pub mod config;
pub mod error;
pub mod five_tuple;
pub mod hack;
pub mod hack_pool;
pub mod nfq_message;
pub mod packet;
pub mod raw_socket;
pub mod token_bucket;
pub mod track;
