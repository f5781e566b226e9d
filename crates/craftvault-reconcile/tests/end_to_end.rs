//! End-to-end integration tests across all planes.
//!
//! These tests exercise the full marketplace lifecycle:
//! Gateway (ingress) -> Mint saga -> Ledger -> Reconciliation scanner ->
//! Catalog read model.
//!
//! They verify that a listing travels draft → minted → listed → escrowed →
//! sold (or back to listed on refund), that every status change the users
//! see comes from an observed ledger event, and that duplicate delivery
//! and re-escrow behave.

use std::{sync::Arc, time::Duration};

use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;

use craftvault_catalog::{CatalogStore, EntityLocks, MemoryCatalog};
use craftvault_ingress::MarketGateway;
use craftvault_ledger::{LedgerClient, testkit::ScriptedNode};
use craftvault_minting::{MemoryPublisher, MintOrchestrator};
use craftvault_reconcile::ReconcileScanner;
use craftvault_types::{
    AccountId, CraftvaultError, EscrowConfig, EscrowId, EscrowStatus, LedgerConfig, Listing,
    ListingDraft, ListingStage, OrchestratorConfig, ScanConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One deployment: a shared scripted ledger and catalog, a gateway per
/// signing identity, and the single reconciliation scanner.
struct Market {
    node: Arc<ScriptedNode>,
    catalog: Arc<MemoryCatalog>,
    scanner: ReconcileScanner,
    seller_gateway: MarketGateway,
    seller: AccountId,
    buyer_gateway: MarketGateway,
    buyer: AccountId,
}

fn gateway_for(
    node: &Arc<ScriptedNode>,
    catalog: &Arc<MemoryCatalog>,
    seed: u8,
) -> (MarketGateway, AccountId) {
    let ledger = Arc::new(LedgerClient::new(
        Arc::clone(node) as _,
        SigningKey::from_bytes(&[seed; 32]),
        LedgerConfig::default(),
    ));
    let sender = ledger.sender();
    let locks = EntityLocks::new();
    let minting = Arc::new(MintOrchestrator::new(
        Arc::clone(catalog) as _,
        Arc::new(MemoryPublisher::new()) as _,
        Arc::clone(&ledger),
        locks.clone(),
        OrchestratorConfig::default(),
    ));
    let gateway = MarketGateway::new(
        Arc::clone(catalog) as _,
        ledger,
        minting,
        locks,
        EscrowConfig::default(),
        craftvault_escrow::ReleasePolicy::default(),
    );
    (gateway, sender)
}

impl Market {
    fn new() -> Self {
        init_tracing();
        // Hour-long blocks keep holding-period arithmetic readable.
        let node = Arc::new(ScriptedNode::with_interval(chrono::Duration::hours(1)));
        let catalog = Arc::new(MemoryCatalog::new());
        let (seller_gateway, seller) = gateway_for(&node, &catalog, 31);
        let (buyer_gateway, buyer) = gateway_for(&node, &catalog, 32);
        let scanner = ReconcileScanner::new(
            Arc::clone(&catalog) as _,
            Arc::new(LedgerClient::new(
                Arc::clone(&node) as _,
                SigningKey::from_bytes(&[33u8; 32]),
                LedgerConfig::default(),
            )),
            ScanConfig {
                confirmation_depth: 0,
                ..ScanConfig::default()
            },
            "scanner-a",
        );
        Self {
            node,
            catalog,
            scanner,
            seller_gateway,
            seller,
            buyer_gateway,
            buyer,
        }
    }

    fn draft(&self) -> ListingDraft {
        ListingDraft {
            title: "Hand-bound leather journal".into(),
            description: "Vegetable-tanned, 240 pages".into(),
            category: "leatherwork".into(),
            price: Decimal::new(85, 0),
            seller: self.seller,
            content: b"journal-photo".to_vec(),
        }
    }

    /// Draft, mint (mining the submission), and list.
    async fn listed_listing(&self) -> Listing {
        let listing = self
            .seller_gateway
            .create_listing(&self.draft())
            .expect("draft listing");

        let miner = tokio::spawn({
            let node = Arc::clone(&self.node);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                node.mine();
            }
        });
        self.seller_gateway
            .request_mint(listing.id, b"journal-photo")
            .await
            .expect("mint should succeed");
        miner.await.expect("miner task");

        self.seller_gateway
            .request_list(listing.id)
            .expect("list should succeed")
    }

    /// Escrow the listing and reconcile the creation event.
    async fn open_escrow(&self, listing: &Listing) -> EscrowId {
        self.buyer_gateway
            .request_escrow_create(listing.id, self.buyer, listing.price)
            .await
            .expect("escrow create should submit");
        self.node.mine();
        let metrics = self.scanner.scan_once().await.expect("scan");
        assert!(metrics.applied >= 1, "creation event should apply");

        let listing = self.catalog.listing(listing.id).expect("listing");
        assert_eq!(listing.stage, ListingStage::Escrowed);
        // The scripted contract assigns escrow ids monotonically; the
        // snapshot for the latest one carries our certificate.
        let certificate = listing.certificate.expect("certificate");
        for id in (1..=8).rev() {
            if let Some(snapshot) = self.catalog.escrow(EscrowId(id)).expect("escrow read") {
                if snapshot.certificate == certificate
                    && snapshot.status == EscrowStatus::Created
                {
                    return snapshot.id;
                }
            }
        }
        panic!("no open escrow snapshot found");
    }
}

#[tokio::test(start_paused = true)]
async fn full_sale_cycle_ends_sold_with_buyer_ownership() {
    let market = Market::new();
    let listing = market.listed_listing().await;
    assert_eq!(listing.stage, ListingStage::Listed);

    let escrow = market.open_escrow(&listing).await;

    // Status view straight after creation: full holding period ahead.
    let view = market
        .buyer_gateway
        .escrow_status(escrow)
        .await
        .expect("status");
    assert_eq!(view.snapshot.status, EscrowStatus::Created);
    assert_eq!(view.remaining, chrono::Duration::days(7));

    // Buyer confirms receipt; the release lands on-ledger and the scanner
    // applies it.
    market
        .buyer_gateway
        .request_release(escrow, market.buyer)
        .await
        .expect("release should submit");
    market.node.mine();
    market.scanner.scan_once().await.expect("scan");

    let listing = market.catalog.listing(listing.id).expect("listing");
    assert_eq!(listing.stage, ListingStage::Sold);
    assert_eq!(listing.owner, market.buyer);

    let certificate = market
        .catalog
        .certificate(listing.certificate.expect("certificate"))
        .expect("certificate record");
    assert_eq!(certificate.owner, market.buyer);

    // The scripted contract agrees on ownership.
    assert_eq!(
        market.node.certificate_owner(certificate.id),
        Some(market.buyer)
    );

    let view = market
        .buyer_gateway
        .escrow_status(escrow)
        .await
        .expect("status");
    assert_eq!(view.snapshot.status, EscrowStatus::Released);
}

#[tokio::test(start_paused = true)]
async fn refund_after_holding_period_relists_and_permits_re_escrow() {
    let market = Market::new();
    let listing = market.listed_listing().await;
    let escrow = market.open_escrow(&listing).await;

    // Too early: rejected locally, nothing submitted.
    let submissions_before = market.node.submission_count();
    let err = market
        .buyer_gateway
        .request_refund(escrow, market.buyer)
        .await
        .expect_err("refund before the deadline must be rejected");
    assert!(matches!(err, CraftvaultError::DeadlineNotReached { .. }));
    assert_eq!(market.node.submission_count(), submissions_before);

    // 7 days + a little pass on-ledger.
    market.node.advance_blocks(24 * 7 + 2);
    market
        .buyer_gateway
        .request_refund(escrow, market.buyer)
        .await
        .expect("refund after the deadline should submit");
    market.node.mine();
    market.scanner.scan_once().await.expect("scan");

    let snapshot = market
        .catalog
        .escrow(escrow)
        .expect("escrow read")
        .expect("snapshot");
    assert_eq!(snapshot.status, EscrowStatus::Refunded);

    // Seller keeps the certificate; the listing is sellable again.
    let relisted = market.catalog.listing(listing.id).expect("listing");
    assert_eq!(relisted.stage, ListingStage::Listed);
    assert_eq!(relisted.owner, market.seller);

    // A fresh buyer escrow gets a new id against the same certificate.
    let second = market.open_escrow(&relisted).await;
    assert_ne!(second, escrow);
}

#[tokio::test(start_paused = true)]
async fn duplicate_release_delivery_settles_once() {
    let market = Market::new();
    let listing = market.listed_listing().await;
    let escrow = market.open_escrow(&listing).await;

    market
        .buyer_gateway
        .request_release(escrow, market.buyer)
        .await
        .expect("release should submit");
    market.node.mine();
    // The same release event arrives a second time.
    market.node.replay_last_log();

    let metrics = market.scanner.scan_once().await.expect("scan");
    assert_eq!(metrics.rejected, 1, "duplicate must be rejected");

    let listing_after = market.catalog.listing(listing.id).expect("listing");
    assert_eq!(listing_after.stage, ListingStage::Sold);
    assert_eq!(listing_after.owner, market.buyer);

    // A later scan with nothing new is a clean no-op.
    let metrics = market.scanner.scan_once().await.expect("scan");
    assert_eq!(metrics.applied, 0);
    assert_eq!(metrics.rejected, 0);
}

#[tokio::test(start_paused = true)]
async fn non_buyer_release_never_reaches_the_ledger() {
    let market = Market::new();
    let listing = market.listed_listing().await;
    let escrow = market.open_escrow(&listing).await;

    let submissions_before = market.node.submission_count();
    let err = market
        .seller_gateway
        .request_release(escrow, market.seller)
        .await
        .expect_err("seller cannot release before the deadline");
    assert!(matches!(err, CraftvaultError::NotBuyer { .. }));
    assert_eq!(market.node.submission_count(), submissions_before);
}
