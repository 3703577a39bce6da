pub mod cache;
pub mod coordinator;
pub mod domain;
pub mod http;
pub mod repository;
pub mod service;
pub mod storage;
pub mod websocket;
