//! The mint saga.
//!
//! Sequence: publish content → publish metadata → submit mint → await
//! confirmation → extract certificate → persist. Progress is checkpointed
//! in the catalog after every step, and the pending handle lands in the
//! checkpoint *before* the confirmation wait — a crash mid-wait resumes by
//! re-polling the same handle. Restarting from the top after a submitted
//! transaction would mint twice.

use std::sync::Arc;

use craftvault_types::{
    Backoff, Certificate, CraftvaultError, Listing, ListingId, MintCheckpoint, MintStage,
    OrchestratorConfig, Result,
};
use rust_decimal::Decimal;

use craftvault_catalog::{CatalogStore, EntityLocks};
use craftvault_ledger::{ContractCall, LedgerClient, codec};

use crate::{metadata::MetadataDocument, publisher::ContentPublisher};

/// Drives the mint saga for one deployment.
pub struct MintOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    publisher: Arc<dyn ContentPublisher>,
    ledger: Arc<LedgerClient>,
    locks: EntityLocks,
    config: OrchestratorConfig,
}

impl MintOrchestrator {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        publisher: Arc<dyn ContentPublisher>,
        ledger: Arc<LedgerClient>,
        locks: EntityLocks,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            catalog,
            publisher,
            ledger,
            locks,
            config,
        }
    }

    /// Mint a certificate for the listing, publishing `content` as the
    /// primary asset. Safe to call again after any interruption: completed
    /// steps are skipped via the checkpoint.
    ///
    /// # Errors
    /// - `OperationInFlight` while another mint holds the listing's lock
    /// - `AlreadyMinted` once a certificate exists
    /// - `ConfirmationTimeout` when the wait deadline passes (resumable)
    /// - `CertificateNotFound` (fatal) when the confirmed receipt carries
    ///   no zero-from transfer
    pub async fn mint(&self, listing_id: ListingId, content: &[u8]) -> Result<Certificate> {
        let _guard = self.locks.try_lock(format!("listing:{listing_id}"))?;

        let listing = self.catalog.listing(listing_id)?;
        if !listing.active {
            return Err(CraftvaultError::ListingInactive(listing_id));
        }
        if let Some(certificate) = listing.certificate {
            // A stale checkpoint can survive a crash between persisting the
            // certificate and the cleanup; drop it here.
            self.catalog.clear_checkpoint(listing_id)?;
            return Err(CraftvaultError::AlreadyMinted {
                listing: listing_id,
                certificate,
            });
        }

        let mut checkpoint = self
            .catalog
            .checkpoint(listing_id)?
            .unwrap_or_else(|| MintCheckpoint::new(listing_id));

        // Step 1: primary content. Skipped on resume.
        let content_address = match checkpoint.content.clone() {
            Some(address) => address,
            None => {
                let address = self.publish_with_retry(content, MintStage::Started).await?;
                checkpoint.content = Some(address.clone());
                self.catalog.save_checkpoint(&checkpoint)?;
                tracing::debug!(listing = %listing_id, address = %address, "content published");
                address
            }
        };

        // Step 2: metadata document (the certificate URI target).
        let metadata_address = match checkpoint.metadata.clone() {
            Some(address) => address,
            None => {
                let document = MetadataDocument::for_listing(&listing, &content_address);
                let address = self
                    .publish_with_retry(&document.to_bytes()?, MintStage::ContentPublished)
                    .await?;
                checkpoint.metadata = Some(address.clone());
                self.catalog.save_checkpoint(&checkpoint)?;
                tracing::debug!(listing = %listing_id, address = %address, "metadata published");
                address
            }
        };

        // Step 3: submit, persisting the handle before any waiting.
        let handle = match checkpoint.pending {
            Some(handle) => handle,
            None => {
                let call = ContractCall::Mint {
                    metadata: metadata_address.clone(),
                };
                let handle = self.ledger.submit(call, Decimal::ZERO).await?;
                checkpoint.pending = Some(handle);
                self.catalog.save_checkpoint(&checkpoint)?;
                tracing::info!(listing = %listing_id, tx = %handle.tx_hash, "mint submitted");
                handle
            }
        };

        // Step 4: confirmation and certificate extraction.
        let receipt = self
            .ledger
            .await_confirmation(
                handle,
                self.config.min_confirmations,
                self.config.confirmation_deadline,
            )
            .await?;

        let transfer = codec::extract_mint_transfer(&receipt)
            .ok_or(CraftvaultError::CertificateNotFound(receipt.tx_hash))?;

        // Step 5: persist the certificate and advance the listing.
        let certificate = Certificate {
            id: transfer.certificate,
            metadata: metadata_address,
            owner: listing.seller,
            mint_tx: receipt.tx_hash,
            minted_at: receipt.block_time,
        };
        self.catalog.put_certificate(certificate.clone())?;
        self.update_listing_with_retries(listing_id, |listing| {
            listing.attach_certificate(certificate.id)
        })?;
        self.catalog.clear_checkpoint(listing_id)?;

        tracing::info!(
            listing = %listing_id,
            certificate = %certificate.id,
            tx = %certificate.mint_tx,
            "mint complete"
        );
        Ok(certificate)
    }

    /// Publish with bounded exponential backoff on Transient failures.
    async fn publish_with_retry(
        &self,
        bytes: &[u8],
        after: MintStage,
    ) -> Result<craftvault_types::ContentAddress> {
        let mut backoff = Backoff::new(&self.config.publish_backoff);
        loop {
            match self.publisher.publish(bytes).await {
                Ok(address) => return Ok(address),
                Err(err) if err.is_transient() => match backoff.next() {
                    Some(delay) => {
                        tracing::warn!(%err, ?delay, "publish failed, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(CraftvaultError::MintInterrupted {
                            after,
                            reason: format!("publish retries exhausted: {err}"),
                        });
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Re-read + mutate + optimistic write, bounded by the configured
    /// retry budget.
    fn update_listing_with_retries(
        &self,
        listing_id: ListingId,
        mutate: impl Fn(&mut Listing) -> Result<()>,
    ) -> Result<Listing> {
        let mut attempts = 0u32;
        loop {
            let mut listing = self.catalog.listing(listing_id)?;
            mutate(&mut listing)?;
            match self.catalog.update_listing(&listing) {
                Ok(updated) => return Ok(updated),
                Err(CraftvaultError::VersionConflict { .. })
                    if attempts < self.config.version_retries =>
                {
                    attempts += 1;
                }
                Err(CraftvaultError::VersionConflict { .. }) => {
                    return Err(CraftvaultError::VersionRetriesExhausted { attempts });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use ed25519_dalek::SigningKey;

    use craftvault_catalog::MemoryCatalog;
    use craftvault_ledger::testkit::ScriptedNode;
    use craftvault_types::{
        ContentAddress, LedgerConfig, ListingDraft, ListingId, ListingStage,
    };

    use crate::publisher::MemoryPublisher;

    struct Fixture {
        node: Arc<ScriptedNode>,
        catalog: Arc<MemoryCatalog>,
        publisher: Arc<MemoryPublisher>,
        orchestrator: MintOrchestrator,
        listing_id: ListingId,
    }

    fn fixture_with(config: OrchestratorConfig) -> Fixture {
        let node = Arc::new(ScriptedNode::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let ledger = Arc::new(LedgerClient::new(
            Arc::clone(&node) as _,
            SigningKey::from_bytes(&[9u8; 32]),
            LedgerConfig::default(),
        ));
        let seller = ledger.sender();

        let draft = ListingDraft {
            title: "Hand-carved spoon".into(),
            description: "Cherry wood".into(),
            category: "woodwork".into(),
            price: Decimal::new(30, 0),
            seller,
            content: b"spoon-image".to_vec(),
        };
        let listing = catalog
            .create_listing(craftvault_types::Listing::draft(
                ListingId::new(),
                &draft,
                Utc::now(),
            ))
            .unwrap();

        let orchestrator = MintOrchestrator::new(
            Arc::clone(&catalog) as _,
            Arc::clone(&publisher) as _,
            ledger,
            EntityLocks::new(),
            config,
        );

        Fixture {
            node,
            catalog,
            publisher,
            orchestrator,
            listing_id: listing.id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(OrchestratorConfig::default())
    }

    async fn mint_with_mining(fx: &Fixture) -> Certificate {
        let node = Arc::clone(&fx.node);
        let miner = tokio::spawn(async move {
            // Wait out the submission, then include it.
            tokio::time::sleep(Duration::from_secs(1)).await;
            node.mine();
        });
        let cert = fx
            .orchestrator
            .mint(fx.listing_id, b"spoon-image")
            .await
            .unwrap();
        miner.await.unwrap();
        cert
    }

    #[tokio::test(start_paused = true)]
    async fn full_mint_persists_certificate_and_stage() {
        let fx = fixture();
        let cert = mint_with_mining(&fx).await;

        // Two publishes: content + metadata.
        assert_eq!(fx.publisher.publish_count(), 2);

        let listing = fx.catalog.listing(fx.listing_id).unwrap();
        assert_eq!(listing.stage, ListingStage::Minted);
        assert_eq!(listing.certificate, Some(cert.id));

        let stored = fx.catalog.certificate(cert.id).unwrap();
        assert_eq!(stored, cert);
        assert_eq!(stored.owner, listing.seller);

        // Checkpoint cleaned up after completion.
        assert!(fx.catalog.checkpoint(fx.listing_id).unwrap().is_none());

        // The metadata document actually references the content address.
        let meta_bytes = fx.publisher.fetch(&stored.metadata).unwrap();
        let doc: MetadataDocument = serde_json::from_slice(&meta_bytes).unwrap();
        assert_eq!(doc.image, ContentAddress::for_bytes(b"spoon-image").uri());
    }

    #[tokio::test(start_paused = true)]
    async fn second_mint_is_rejected() {
        let fx = fixture();
        mint_with_mining(&fx).await;

        let err = fx
            .orchestrator
            .mint(fx.listing_id, b"spoon-image")
            .await
            .unwrap_err();
        assert!(matches!(err, CraftvaultError::AlreadyMinted { .. }));
        assert_eq!(fx.node.submission_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_mints_yield_exactly_one_certificate() {
        let fx = fixture_with(OrchestratorConfig::default());
        let orchestrator = Arc::new(fx.orchestrator);
        let listing_id = fx.listing_id;

        let first = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.mint(listing_id, b"spoon-image").await }
        });
        // Let the first mint reach its confirmation wait.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let second = orchestrator.mint(listing_id, b"spoon-image").await;
        assert!(matches!(
            second,
            Err(CraftvaultError::OperationInFlight { .. })
        ));

        fx.node.mine();
        let cert = first.await.unwrap().unwrap();

        assert_eq!(fx.node.submission_count(), 1);
        assert_eq!(
            fx.catalog.listing(listing_id).unwrap().certificate,
            Some(cert.id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_resume_does_not_resubmit() {
        let fx = fixture_with(OrchestratorConfig {
            confirmation_deadline: Duration::from_secs(4),
            ..OrchestratorConfig::default()
        });

        // Never mined: the first attempt times out, leaving the handle in
        // the checkpoint.
        let err = fx
            .orchestrator
            .mint(fx.listing_id, b"spoon-image")
            .await
            .unwrap_err();
        assert!(matches!(err, CraftvaultError::ConfirmationTimeout { .. }));

        let checkpoint = fx.catalog.checkpoint(fx.listing_id).unwrap().unwrap();
        assert_eq!(checkpoint.furthest(), MintStage::Submitted);

        // The transaction lands while nobody is waiting.
        fx.node.mine();

        // Resume: no new submission, no new publishes, certificate persisted.
        let cert = fx
            .orchestrator
            .mint(fx.listing_id, b"spoon-image")
            .await
            .unwrap();
        assert_eq!(fx.node.submission_count(), 1);
        assert_eq!(fx.publisher.publish_count(), 2);
        assert_eq!(
            fx.catalog.listing(fx.listing_id).unwrap().certificate,
            Some(cert.id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn checkpointed_content_is_not_republished() {
        let fx = fixture();

        // A previous partial run already published the content.
        let address = ContentAddress::for_bytes(b"spoon-image");
        let mut checkpoint = MintCheckpoint::new(fx.listing_id);
        checkpoint.content = Some(address);
        fx.catalog.save_checkpoint(&checkpoint).unwrap();

        mint_with_mining(&fx).await;
        // Only the metadata publish happened in this run.
        assert_eq!(fx.publisher.publish_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_receipt_without_transfer_is_fatal() {
        let fx = fixture();

        // Plant a pending handle whose receipt will carry no transfer:
        // an escrow call against a certificate the contract doesn't know.
        let ledger = LedgerClient::new(
            Arc::clone(&fx.node) as _,
            SigningKey::from_bytes(&[9u8; 32]),
            LedgerConfig::default(),
        );
        let handle = ledger
            .submit(
                ContractCall::CreateEscrow {
                    certificate: craftvault_types::CertificateId(999),
                },
                Decimal::ZERO,
            )
            .await
            .unwrap();
        fx.node.mine();

        let mut checkpoint = MintCheckpoint::new(fx.listing_id);
        checkpoint.content = Some(ContentAddress::for_bytes(b"spoon-image"));
        checkpoint.metadata = Some(ContentAddress::for_bytes(b"meta"));
        checkpoint.pending = Some(handle);
        fx.catalog.save_checkpoint(&checkpoint).unwrap();

        let err = fx
            .orchestrator
            .mint(fx.listing_id, b"spoon-image")
            .await
            .unwrap_err();
        assert!(matches!(err, CraftvaultError::CertificateNotFound(_)));
        assert_eq!(err.class(), craftvault_types::ErrorClass::Fatal);

        // No certificate, listing untouched.
        assert!(fx.catalog.listing(fx.listing_id).unwrap().certificate.is_none());
    }

    /// Publisher that fails a scripted number of times before succeeding.
    struct FlakyPublisher {
        inner: MemoryPublisher,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl ContentPublisher for FlakyPublisher {
        async fn publish(&self, bytes: &[u8]) -> craftvault_types::Result<ContentAddress> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CraftvaultError::PublishFailed {
                    reason: "scripted outage".into(),
                });
            }
            self.inner.publish(bytes).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_publish_failures_are_retried() {
        let node = Arc::new(ScriptedNode::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let publisher = Arc::new(FlakyPublisher {
            inner: MemoryPublisher::new(),
            failures_left: AtomicU32::new(2),
        });
        let ledger = Arc::new(LedgerClient::new(
            Arc::clone(&node) as _,
            SigningKey::from_bytes(&[9u8; 32]),
            LedgerConfig::default(),
        ));
        let draft = ListingDraft {
            title: "Raku bowl".into(),
            description: "Crackle glaze".into(),
            category: "ceramics".into(),
            price: Decimal::new(55, 0),
            seller: ledger.sender(),
            content: b"bowl".to_vec(),
        };
        let listing = catalog
            .create_listing(craftvault_types::Listing::draft(
                ListingId::new(),
                &draft,
                Utc::now(),
            ))
            .unwrap();
        let orchestrator = MintOrchestrator::new(
            Arc::clone(&catalog) as _,
            Arc::clone(&publisher) as _,
            ledger,
            EntityLocks::new(),
            OrchestratorConfig::default(),
        );

        let miner = tokio::spawn({
            let node = Arc::clone(&node);
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                node.mine();
            }
        });
        let cert = orchestrator.mint(listing.id, b"bowl").await.unwrap();
        miner.await.unwrap();

        assert_eq!(catalog.listing(listing.id).unwrap().certificate, Some(cert.id));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_publish_retries_surface_with_stage() {
        let catalog = Arc::new(MemoryCatalog::new());
        let node = Arc::new(ScriptedNode::new());
        let publisher = Arc::new(FlakyPublisher {
            inner: MemoryPublisher::new(),
            failures_left: AtomicU32::new(u32::MAX),
        });
        let ledger = Arc::new(LedgerClient::new(
            Arc::clone(&node) as _,
            SigningKey::from_bytes(&[9u8; 32]),
            LedgerConfig::default(),
        ));
        let draft = ListingDraft {
            title: "Raku bowl".into(),
            description: "Crackle glaze".into(),
            category: "ceramics".into(),
            price: Decimal::new(55, 0),
            seller: ledger.sender(),
            content: b"bowl".to_vec(),
        };
        let listing = catalog
            .create_listing(craftvault_types::Listing::draft(
                ListingId::new(),
                &draft,
                Utc::now(),
            ))
            .unwrap();
        let orchestrator = MintOrchestrator::new(
            Arc::clone(&catalog) as _,
            Arc::clone(&publisher) as _,
            ledger,
            EntityLocks::new(),
            OrchestratorConfig::default(),
        );

        let err = orchestrator.mint(listing.id, b"bowl").await.unwrap_err();
        let CraftvaultError::MintInterrupted { after, .. } = err else {
            panic!("expected MintInterrupted, got {err}");
        };
        assert_eq!(after, MintStage::Started);
        assert_eq!(node.submission_count(), 0);
    }
}
