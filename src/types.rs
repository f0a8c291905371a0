//! Core types shared across the orchestration engine.

/// ContentHash: Merkle root over every scanned resource file
pub type ContentHash = [u8; 32];

/// Namespace: unique `"<type>:<name>"` identifier for a resource
pub type Namespace = String;

/// TaskId: identifier of a task, unique within one batch
pub type TaskId = String;
