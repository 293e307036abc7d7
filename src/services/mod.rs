pub mod breakdown;
pub mod clock;
pub mod dedup;
pub mod enrichment;
pub mod fun_facts;
pub mod jobs;
pub mod openai;
pub mod orchestrator;
pub mod panels;
pub mod storage;
pub mod story;
