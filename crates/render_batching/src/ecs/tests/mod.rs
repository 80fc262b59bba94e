//! Integration tests for the ECS runtime

mod world_lifecycle;
