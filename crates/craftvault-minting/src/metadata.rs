//! The metadata document published as the certificate URI target.

use serde::{Deserialize, Serialize};

use craftvault_types::{ContentAddress, Listing, Result};

/// One display attribute of the certified asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// The metadata document: name, description, image URI, and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub description: String,
    /// URI form of the published primary content.
    pub image: String,
    pub attributes: Vec<Attribute>,
}

impl MetadataDocument {
    /// Build the document for a listing whose primary content landed at
    /// `image`.
    #[must_use]
    pub fn for_listing(listing: &Listing, image: &ContentAddress) -> Self {
        Self {
            name: listing.title.clone(),
            description: listing.description.clone(),
            image: image.uri(),
            attributes: vec![
                Attribute {
                    trait_type: "Category".into(),
                    value: listing.category.clone(),
                },
                Attribute {
                    trait_type: "Creator".into(),
                    value: listing.seller.to_string(),
                },
            ],
        }
    }

    /// Canonical JSON bytes for publication.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use craftvault_types::{AccountId, ListingDraft, ListingId};
    use rust_decimal::Decimal;

    fn listing() -> Listing {
        let draft = ListingDraft {
            title: "Indigo shibori scarf".into(),
            description: "Hand-dyed silk".into(),
            category: "textiles".into(),
            price: Decimal::new(60, 0),
            seller: AccountId([3u8; 20]),
            content: b"img".to_vec(),
        };
        Listing::draft(ListingId::new(), &draft, Utc::now())
    }

    #[test]
    fn document_carries_listing_fields() {
        let listing = listing();
        let image = ContentAddress::for_bytes(b"img");
        let doc = MetadataDocument::for_listing(&listing, &image);

        assert_eq!(doc.name, "Indigo shibori scarf");
        assert_eq!(doc.image, image.uri());
        assert_eq!(doc.attributes.len(), 2);
        assert_eq!(doc.attributes[0].value, "textiles");
        assert_eq!(doc.attributes[1].value, listing.seller.to_string());
    }

    #[test]
    fn bytes_round_trip() {
        let listing = listing();
        let doc = MetadataDocument::for_listing(&listing, &ContentAddress::for_bytes(b"img"));
        let bytes = doc.to_bytes().unwrap();
        let back: MetadataDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn same_listing_same_bytes() {
        // Deterministic serialization keeps the metadata content address
        // stable across retries.
        let listing = listing();
        let image = ContentAddress::for_bytes(b"img");
        let a = MetadataDocument::for_listing(&listing, &image).to_bytes().unwrap();
        let b = MetadataDocument::for_listing(&listing, &image).to_bytes().unwrap();
        assert_eq!(a, b);
    }
}
