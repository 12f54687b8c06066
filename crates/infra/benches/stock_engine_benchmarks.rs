use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use millerp_accounting::SystemAccountKey;
use millerp_core::{AccountId, CompanyId, ItemId, UnitId, UserId, WarehouseId};
use millerp_infra::config::{CatalogSeed, SystemAccountSeed};
use millerp_infra::{
    InMemoryWarehouseStore, OutboundLineRequest, OutboundRequest, OutboundService, StockEngine,
};
use millerp_inventory::{
    IssuePurpose, Item, Movement, ReferenceType, StockLocation, Unit, Warehouse,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

struct Bench {
    stock: StockEngine<InMemoryWarehouseStore>,
    outbound: OutboundService<InMemoryWarehouseStore>,
    location: StockLocation,
    item_id: ItemId,
    unit_id: UnitId,
    actor: UserId,
}

fn setup() -> Bench {
    let company = CompanyId::new();
    let warehouse_id = WarehouseId::new();
    let unit_id = UnitId::new();
    let item_id = ItemId::new();
    let seed = CatalogSeed {
        units: vec![Unit {
            id: unit_id,
            code: "KG".to_string(),
            name: "Kilogram".to_string(),
        }],
        items: vec![Item {
            id: item_id,
            sku: "CPO".to_string(),
            name: "Crude palm oil".to_string(),
            base_unit_id: unit_id,
            conversions: vec![],
            active: true,
        }],
        warehouses: vec![Warehouse {
            id: warehouse_id,
            company_id: company,
            code: "WH01".to_string(),
            name: "Tank farm".to_string(),
            active: true,
        }],
        bins: vec![],
        system_accounts: [
            SystemAccountKey::InventoryGeneral,
            SystemAccountKey::ProductionConsumption,
        ]
        .into_iter()
        .map(|key| SystemAccountSeed {
            company_id: company,
            key,
            account_id: AccountId::new(),
        })
        .collect(),
    };
    let store = Arc::new(InMemoryWarehouseStore::from_seed(seed).expect("seed"));
    Bench {
        stock: StockEngine::new(store.clone()),
        outbound: OutboundService::new(store),
        location: StockLocation::new(warehouse_id, None),
        item_id,
        unit_id,
        actor: UserId::new(),
    }
}

fn movement(bench: &Bench, qty_delta: Decimal, unit_cost: Option<Decimal>) -> Movement {
    Movement {
        item_id: bench.item_id,
        location: bench.location,
        qty_delta,
        unit_cost,
        reference_type: ReferenceType::Adj,
        reference_id: Uuid::now_v7(),
        note: None,
        actor: bench.actor,
        occurred_at: Utc::now(),
    }
}

fn bench_movement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_latency");
    group.sample_size(1000);

    group.bench_function("costed_receipt", |b| {
        let bench = setup();
        b.iter(|| {
            bench
                .stock
                .apply_movement(black_box(movement(&bench, Decimal::ONE, Some(Decimal::TEN))))
                .expect("movement")
        })
    });

    group.bench_function("production_issue_with_gl", |b| {
        let bench = setup();
        bench
            .stock
            .apply_movement(movement(&bench, Decimal::from(10_000_000), Some(Decimal::TEN)))
            .expect("opening");
        b.iter(|| {
            bench
                .outbound
                .create_outbound(
                    black_box(OutboundRequest {
                        warehouse_id: bench.location.warehouse_id,
                        bin_id: None,
                        purpose: IssuePurpose::Prod,
                        loan_receiver: None,
                        expected_return_at: None,
                        note: None,
                        lines: vec![OutboundLineRequest {
                            item_id: bench.item_id,
                            unit_id: bench.unit_id,
                            qty: Decimal::ONE,
                        }],
                    }),
                    bench.actor,
                )
                .expect("issue")
        })
    });

    group.finish();
}

fn bench_ledger_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_replay");

    for history in [100u64, 1_000, 10_000].iter() {
        let bench = setup();
        for _ in 0..*history {
            bench
                .stock
                .apply_movement(movement(&bench, Decimal::ONE, Some(Decimal::TEN)))
                .expect("movement");
        }
        group.throughput(Throughput::Elements(*history));
        group.bench_with_input(BenchmarkId::from_parameter(history), history, |b, _| {
            b.iter(|| {
                bench
                    .stock
                    .reconcile_location(black_box(bench.item_id), bench.location)
                    .expect("reconcile")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_movement_latency, bench_ledger_replay);
criterion_main!(benches);
