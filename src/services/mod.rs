pub mod ingest_service;
pub mod naming;
pub mod storage_service;
