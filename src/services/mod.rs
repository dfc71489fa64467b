pub(crate) mod backend_client;
pub(crate) mod code_runner;
pub(crate) mod result_merge;
pub(crate) mod stdio_bridge;
