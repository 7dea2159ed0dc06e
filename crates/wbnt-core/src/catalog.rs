use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ProductStatus};

pub const DEFAULT_SIZE: &str = "Free Size";

/// One product entry in the seed catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CatalogProduct {
    #[must_use]
    pub fn size_or_default(&self) -> &str {
        self.size
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SIZE)
    }

    #[must_use]
    pub fn status_or_default(&self) -> ProductStatus {
        self.status.unwrap_or(ProductStatus::Available)
    }
}

// YAML catalogs may wrap the list under `products:`; JSON catalogs are a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Bare(Vec<CatalogProduct>),
    Wrapped { products: Vec<CatalogProduct> },
}

impl CatalogFile {
    fn into_products(self) -> Vec<CatalogProduct> {
        match self {
            CatalogFile::Bare(products) | CatalogFile::Wrapped { products } => products,
        }
    }
}

/// Load and validate a seed catalog from a JSON or YAML file.
///
/// The format is chosen by extension: `.yaml`/`.yml` are YAML, everything
/// else is JSON.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogProduct>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let file: CatalogFile = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::CatalogFileParse(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| ConfigError::CatalogFileParse(e.to_string()))?
    };

    let products = file.into_products();
    validate_catalog(&products)?;
    Ok(products)
}

fn validate_catalog(products: &[CatalogProduct]) -> Result<(), ConfigError> {
    for (index, product) in products.iter().enumerate() {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product #{} must have a non-empty name",
                index + 1
            )));
        }

        if product.price < 0 {
            return Err(ConfigError::Validation(format!(
                "product '{}' has negative price {}",
                product.name, product.price
            )));
        }

        if let Some(rating) = product.rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' has rating {rating}; must be between 0 and 5",
                    product.name
                )));
            }
        }

        if product.review_count.is_some_and(|c| c < 0) {
            return Err(ConfigError::Validation(format!(
                "product '{}' has a negative review count",
                product.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        file.write_all(body.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn loads_json_array_with_camel_case_fields() {
        let file = write_temp(
            ".json",
            r#"[
                {"name": "Baby Tee", "price": 350, "category": "Tops", "rating": 4.5, "reviewCount": 12},
                {"name": "Cargo Pants", "price": 800, "status": "Sold"}
            ]"#,
        );
        let products = load_catalog(file.path()).expect("load");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].review_count, Some(12));
        assert_eq!(products[0].size_or_default(), DEFAULT_SIZE);
        assert_eq!(products[0].status_or_default(), ProductStatus::Available);
        assert_eq!(products[1].status_or_default(), ProductStatus::Sold);
    }

    #[test]
    fn loads_wrapped_yaml() {
        let file = write_temp(
            ".yaml",
            "products:\n  - name: Y2K Halter\n    price: 420\n    size: S\n",
        );
        let products = load_catalog(file.path()).expect("load");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].size_or_default(), "S");
    }

    #[test]
    fn rejects_blank_name() {
        let file = write_temp(".json", r#"[{"name": "  ", "price": 100}]"#);
        let err = load_catalog(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_out_of_range_rating() {
        let file = write_temp(".json", r#"[{"name": "Skirt", "price": 100, "rating": 7}]"#);
        let err = load_catalog(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("rating")));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_catalog(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, ConfigError::CatalogFileIo { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_temp(".json", "{not json");
        let err = load_catalog(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::CatalogFileParse(_)));
    }
}
