//! Vehicle data — offline catalog plus live VIN / model lookups.
//!
//! [`VehicleDataProvider`] is the boundary: every lookup failure is logged
//! and turned into an empty (or fallback) result here, so the questionnaire
//! never sees a network-shaped error.

pub mod catalog;
pub mod vpic;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LookupError;

pub use catalog::{
    CatalogLoader, CatalogSource, FileCatalogSource, HttpCatalogSource, VehicleCatalog,
    catalog_source,
};
pub use vpic::VpicClient;

/// Placeholder model offered when the models lookup fails.
pub const UNSPECIFIED_MODEL: &str = "Unspecified";

/// Partial vehicle record from a VIN decode; unresolved parts are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedVehicle {
    pub year: String,
    pub make: String,
    pub model: String,
}

impl DecodedVehicle {
    /// Nothing could be resolved.
    pub fn is_unresolved(&self) -> bool {
        self.year.is_empty() && self.make.is_empty() && self.model.is_empty()
    }

    /// Year, make and model are all present.
    pub fn is_complete(&self) -> bool {
        !self.year.is_empty() && !self.make.is_empty() && !self.model.is_empty()
    }
}

/// Live lookups against a vehicle data service.
#[async_trait]
pub trait VehicleLookup: Send + Sync {
    async fn decode_vin(&self, vin: &str) -> Result<DecodedVehicle, LookupError>;

    async fn models_for_make_year(&self, make: &str, year: &str)
    -> Result<Vec<String>, LookupError>;
}

/// Pull-only facade over the catalog and the live lookup service.
pub struct VehicleDataProvider {
    lookup: Arc<dyn VehicleLookup>,
    catalog: CatalogLoader,
}

impl VehicleDataProvider {
    pub fn new(lookup: Arc<dyn VehicleLookup>, catalog_source: Arc<dyn CatalogSource>) -> Self {
        Self {
            lookup,
            catalog: CatalogLoader::new(catalog_source),
        }
    }

    /// The offline catalog; empty if it could not be loaded.
    pub async fn load_catalog(&self) -> Arc<VehicleCatalog> {
        self.catalog.load().await
    }

    pub async fn catalog_years(&self) -> Vec<String> {
        self.load_catalog().await.years()
    }

    pub async fn catalog_makes(&self, year: &str) -> Vec<String> {
        self.load_catalog().await.makes(year)
    }

    pub async fn catalog_models(&self, year: &str, make: &str) -> Vec<String> {
        self.load_catalog().await.models(year, make)
    }

    /// Decode a VIN. Any failure yields an all-empty record.
    pub async fn decode_vin(&self, vin: &str) -> DecodedVehicle {
        match self.lookup.decode_vin(vin).await {
            Ok(vehicle) => vehicle,
            Err(e) => {
                warn!(vin = %vin, error = %e, "VIN decode failed");
                DecodedVehicle::default()
            }
        }
    }

    /// Models for a make/year. Failure (or an empty answer) yields the single
    /// "unspecified" placeholder so the step can still proceed.
    pub async fn models_for_make_year(&self, make: &str, year: &str) -> Vec<String> {
        match self.lookup.models_for_make_year(make, year).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => vec![UNSPECIFIED_MODEL.to_string()],
            Err(e) => {
                warn!(make = %make, year = %year, error = %e, "Model lookup failed");
                vec![UNSPECIFIED_MODEL.to_string()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownLookup;

    #[async_trait]
    impl VehicleLookup for DownLookup {
        async fn decode_vin(&self, _vin: &str) -> Result<DecodedVehicle, LookupError> {
            Err(LookupError::RequestFailed {
                service: "vpic".into(),
                reason: "connection refused".into(),
            })
        }

        async fn models_for_make_year(
            &self,
            _make: &str,
            _year: &str,
        ) -> Result<Vec<String>, LookupError> {
            Err(LookupError::RequestFailed {
                service: "vpic".into(),
                reason: "connection refused".into(),
            })
        }
    }

    struct EmptyModels;

    #[async_trait]
    impl VehicleLookup for EmptyModels {
        async fn decode_vin(&self, _vin: &str) -> Result<DecodedVehicle, LookupError> {
            Ok(DecodedVehicle {
                year: "2018".into(),
                make: String::new(),
                model: String::new(),
            })
        }

        async fn models_for_make_year(
            &self,
            _make: &str,
            _year: &str,
        ) -> Result<Vec<String>, LookupError> {
            Ok(Vec::new())
        }
    }

    fn provider(lookup: Arc<dyn VehicleLookup>) -> VehicleDataProvider {
        VehicleDataProvider::new(
            lookup,
            Arc::new(FileCatalogSource::new("/nonexistent/catalog.json")),
        )
    }

    #[tokio::test]
    async fn failures_degrade_to_empty_values() {
        let provider = provider(Arc::new(DownLookup));

        assert!(provider.decode_vin("1HGCV1F30JA000001").await.is_unresolved());
        assert_eq!(
            provider.models_for_make_year("HONDA", "2019").await,
            vec![UNSPECIFIED_MODEL]
        );
        assert!(provider.catalog_years().await.is_empty());
        assert!(provider.catalog_makes("2019").await.is_empty());
        assert!(provider.catalog_models("2019", "HONDA").await.is_empty());
    }

    #[tokio::test]
    async fn partial_decode_passes_through() {
        let provider = provider(Arc::new(EmptyModels));
        let decoded = provider.decode_vin("ABC").await;
        assert!(!decoded.is_unresolved());
        assert!(!decoded.is_complete());
        assert_eq!(
            provider.models_for_make_year("HONDA", "2019").await,
            vec![UNSPECIFIED_MODEL]
        );
    }
}
