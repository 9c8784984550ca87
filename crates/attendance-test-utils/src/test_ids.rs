//! Fixed test IDs for deterministic tests
//!
//! All test IDs are deterministic to ensure reproducible test results.
//! Using fixed UUIDs prevents flaky tests caused by random data.

use common::types::UserId;
use uuid::Uuid;

// Owners (1-99)
pub const TEST_OWNER: UserId = UserId(Uuid::from_u128(1));
pub const TEST_OTHER_OWNER: UserId = UserId(Uuid::from_u128(2));

// Participants (100-199)
pub const TEST_USER_ALICE: UserId = UserId(Uuid::from_u128(100));
pub const TEST_USER_BOB: UserId = UserId(Uuid::from_u128(101));
pub const TEST_USER_CHARLIE: UserId = UserId(Uuid::from_u128(102));

// Class names
pub const TEST_CLASS_NAME: &str = "CS201 Data Structures";
pub const TEST_CLASS_NAME_SHORT: &str = "CS201";

// Backend credentials
pub const TEST_ANON_KEY: &str = "test-anon-key-do-not-use-in-production";
