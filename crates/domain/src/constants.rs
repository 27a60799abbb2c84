//! Petstore API constants

/// API name; the default circuit breaker service name of the client
pub const API_NAME: &str = "petstore";

/// Largest page size `listPets` accepts
pub const MAX_PAGE_LIMIT: u32 = 100;

// Path templates
pub const PETS_PATH: &str = "/pets";
pub const PET_PATH: &str = "/pets/{petId}";
