//! Generated client for the petstore sample API
//!
//! Each method is per-operation glue: validate arguments, describe the
//! request, hand it to the shared executor, then classify the response
//! status into the operation's success model or its typed error.

use reqwest::{Method, StatusCode};
use tollgate_domain::constants::{API_NAME, PETS_PATH, PET_PATH};
use tollgate_domain::{
    CreatePetError, DeletePetError, GetPetError, ListPetsError, ListPetsQuery, NewPet, Pet,
    PetPage, PetUpdate, UpdatePetError,
};
use tracing::{debug, instrument};

use crate::api::{CallError, Client, ClientBuildError, ClientBuilder, OperationRequest};

/// Petstore API client
#[derive(Debug, Clone)]
pub struct PetstoreClient {
    client: Client,
}

impl PetstoreClient {
    /// Builder preconfigured with the petstore API name
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new(API_NAME)
    }

    /// Client for a fixed base URL with default options.
    ///
    /// # Errors
    /// See [`ClientBuilder::build`].
    pub fn connect(address: impl Into<String>) -> Result<Self, ClientBuildError> {
        Self::builder().address(address).build().map(Self::new)
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `GET /pets`
    #[instrument(skip(self))]
    pub async fn list_pets(&self, query: &ListPetsQuery) -> Result<PetPage, CallError<ListPetsError>> {
        query.validate()?;
        let request =
            OperationRequest::new("listPets", Method::GET, PETS_PATH).query_pairs(query.to_pairs());
        self.client.execute(&request).await?.decode(&[StatusCode::OK])
    }

    /// `GET /pets/{petId}`
    #[instrument(skip(self))]
    pub async fn get_pet(&self, pet_id: &str) -> Result<Pet, CallError<GetPetError>> {
        let request =
            OperationRequest::new("getPet", Method::GET, PET_PATH).path_param("petId", pet_id);
        self.client.execute(&request).await?.decode(&[StatusCode::OK])
    }

    /// `POST /pets`
    #[instrument(skip(self, pet), fields(name = %pet.name))]
    pub async fn create_pet(&self, pet: &NewPet) -> Result<Pet, CallError<CreatePetError>> {
        pet.validate()?;
        let request = OperationRequest::new("createPet", Method::POST, PETS_PATH).json(pet)?;
        self.client.execute(&request).await?.decode(&[StatusCode::OK, StatusCode::CREATED])
    }

    /// `PATCH /pets/{petId}`
    #[instrument(skip(self, update))]
    pub async fn update_pet(
        &self,
        pet_id: &str,
        update: &PetUpdate,
    ) -> Result<Pet, CallError<UpdatePetError>> {
        let request = OperationRequest::new("updatePet", Method::PATCH, PET_PATH)
            .path_param("petId", pet_id)
            .json(update)?;
        self.client.execute(&request).await?.decode(&[StatusCode::OK])
    }

    /// `DELETE /pets/{petId}`
    #[instrument(skip(self))]
    pub async fn delete_pet(&self, pet_id: &str) -> Result<(), CallError<DeletePetError>> {
        let request =
            OperationRequest::new("deletePet", Method::DELETE, PET_PATH).path_param("petId", pet_id);
        self.client
            .execute(&request)
            .await?
            .decode_empty(&[StatusCode::OK, StatusCode::NO_CONTENT])
    }

    /// Every pet matching `query`, following `nextCursor` page by page.
    ///
    /// Each page is a separate call with its own retries and circuit
    /// accounting. Stops at a missing cursor or one the service repeats.
    pub async fn list_all_pets(
        &self,
        query: &ListPetsQuery,
    ) -> Result<Vec<Pet>, CallError<ListPetsError>> {
        let mut pets = Vec::new();
        let mut page_query = query.clone();

        loop {
            let page = self.list_pets(&page_query).await?;
            pets.extend(page.items);

            match page.next_cursor {
                Some(cursor) if page_query.cursor.as_deref() != Some(cursor.as_str()) => {
                    debug!(cursor = %cursor, fetched = pets.len(), "following next page");
                    page_query = query.at_cursor(cursor);
                }
                _ => return Ok(pets),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tollgate_common::resilience::RetryPreset;
    use tollgate_domain::{ErrorBody, PetStatus};

    use super::*;
    use crate::testing::{Scripted, ScriptedTransport};

    fn client(script: Vec<Scripted>) -> (PetstoreClient, ScriptedTransport) {
        let transport = ScriptedTransport::new(script);
        let client = PetstoreClient::builder()
            .address("http://pets.internal/v1")
            .transport(Arc::new(transport.clone()))
            .retry_preset(RetryPreset::None)
            .health_reporting(false)
            .build()
            .map(PetstoreClient::new)
            .unwrap();
        (client, transport)
    }

    #[tokio::test]
    async fn test_get_pet_decodes_model() {
        let (petstore, transport) =
            client(vec![Scripted::json(200, r#"{"id":42,"name":"Rex","status":"sold"}"#)]);

        let pet = petstore.get_pet("42").await.unwrap();

        assert_eq!(pet.id, 42);
        assert_eq!(pet.status, PetStatus::Sold);
        assert_eq!(transport.requests()[0].url.as_str(), "http://pets.internal/v1/pets/42");
    }

    #[tokio::test]
    async fn test_declared_error_is_typed() {
        let (petstore, _) =
            client(vec![Scripted::json(404, r#"{"code":"not_found","message":"no pet 7"}"#)]);

        let err = petstore.get_pet("7").await.unwrap_err();
        assert!(matches!(
            err.operation_error(),
            Some(GetPetError::NotFound(ErrorBody { code: Some(code), .. })) if code == "not_found"
        ));
    }

    #[tokio::test]
    async fn test_empty_pet_id_fails_without_network() {
        let (petstore, transport) = client(vec![Scripted::status(200)]);

        let err = petstore.delete_pet("").await.unwrap_err();
        assert!(matches!(err, CallError::Execute(crate::api::ExecuteError::InvalidRequest(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_dot_segment_pet_id_fails_without_network() {
        let (petstore, transport) = client(vec![Scripted::status(204)]);

        for pet_id in [".", ".."] {
            let err = petstore.delete_pet(pet_id).await.unwrap_err();
            assert!(matches!(
                err,
                CallError::Execute(crate::api::ExecuteError::InvalidRequest(
                    crate::api::RequestError::DotSegmentPathParameter { .. }
                ))
            ));
        }
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_without_network() {
        let (petstore, transport) = client(vec![Scripted::status(200)]);

        let err = petstore.create_pet(&NewPet::new(" ")).await.unwrap_err();
        assert!(matches!(err, CallError::Validation(_)));
        let err = petstore.list_pets(&ListPetsQuery::new().limit(500)).await.unwrap_err();
        assert!(matches!(err, CallError::Validation(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_list_all_follows_cursors() {
        let (petstore, transport) = client(vec![
            Scripted::json(200, r#"{"items":[{"id":1,"name":"a"}],"nextCursor":"c1"}"#),
            Scripted::json(200, r#"{"items":[{"id":2,"name":"b"}],"nextCursor":"c2"}"#),
            Scripted::json(200, r#"{"items":[{"id":3,"name":"c"}]}"#),
        ]);

        let pets = petstore.list_all_pets(&ListPetsQuery::new().limit(1)).await.unwrap();

        assert_eq!(pets.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        let queries: Vec<_> =
            transport.requests().iter().map(|r| r.url.query().unwrap_or("").to_string()).collect();
        assert_eq!(queries, vec!["limit=1", "limit=1&cursor=c1", "limit=1&cursor=c2"]);
    }

    #[tokio::test]
    async fn test_list_all_stops_on_repeated_cursor() {
        let (petstore, transport) = client(vec![Scripted::json(
            200,
            r#"{"items":[{"id":1,"name":"a"}],"nextCursor":"same"}"#,
        )]);

        let pets = petstore.list_all_pets(&ListPetsQuery::new()).await.unwrap();
        assert_eq!(pets.len(), 2);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let (petstore, transport) = client(vec![Scripted::status(204)]);

        petstore.delete_pet("5").await.unwrap();
        assert_eq!(transport.requests()[0].method, Method::DELETE);
    }
}
