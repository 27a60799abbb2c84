//! Integration tests for the petstore models and operation errors
//!
//! Decodes realistic service payloads through the public API.

use anyhow::Result;
use tollgate_domain::{
    CreatePetError, ErrorBody, GetPetError, OperationError, PetPage, PetStatus, UpdatePetError,
};

#[test]
fn test_decode_listing_page_from_service() -> Result<()> {
    let body = r#"{
        "items": [
            {"id": 1, "name": "Rex", "tag": "dog", "status": "available"},
            {"id": 2, "name": "Tom", "status": "pending", "createdAt": "2024-01-05T08:30:00Z"},
            {"id": 3, "name": "Nemo"}
        ],
        "nextCursor": "eyJpZCI6M30"
    }"#;

    let page: PetPage = serde_json::from_str(body)?;
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[1].status, PetStatus::Pending);
    assert!(page.items[1].created_at.is_some());
    assert_eq!(page.items[2].status, PetStatus::Available);
    assert_eq!(page.next_cursor.as_deref(), Some("eyJpZCI6M30"));
    Ok(())
}

#[test]
fn test_each_operation_maps_only_its_declared_statuses() {
    let body = br#"{"code":"invalid","message":"name is required"}"#;

    assert!(matches!(
        CreatePetError::from_status(422, body),
        Some(Ok(CreatePetError::InvalidPet(ErrorBody { .. })))
    ));
    assert!(GetPetError::from_status(422, body).is_none());
    assert!(matches!(
        UpdatePetError::from_status(404, body),
        Some(Ok(UpdatePetError::NotFound(_)))
    ));
}

#[test]
fn test_operation_errors_are_std_errors() {
    let err: Box<dyn std::error::Error + Send + Sync> =
        Box::new(GetPetError::NotFound(ErrorBody::new("no pet 42").with_code("not_found")));
    assert_eq!(err.to_string(), "pet not found (404): no pet 42 [not_found]");
}
