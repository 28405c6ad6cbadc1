pub mod mongo;
pub mod time;
