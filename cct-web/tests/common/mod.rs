//! Router fixtures for the cct-web integration suites
//!
//! Seeds a small House: D1-D3 vote together except D3's Nay on the first roll
//! call, R1-R2 always vote Nay, R3 always votes with the Democrats. S1 is a
//! senator.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use cct_common::cache::{AnalysisCache, CacheTtls};
use cct_common::db::init::init_database;
use cct_web::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const ROLLCALLS: usize = 12;

/// Unroutable upstream so portrait requests fall back to the avatar
pub const DEAD_IMAGE_UPSTREAM: &str = "http://127.0.0.1:9";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestApp {
    pub async fn seeded() -> Self {
        let app = Self::empty().await;
        seed_house(&app.pool).await;
        app
    }

    pub async fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("cct.db")).await.unwrap();
        let cache = AnalysisCache::new(pool.clone(), CacheTtls::default());
        let state = AppState::new(pool.clone(), cache, 119).with_image_base_url(DEAD_IMAGE_UPSTREAM);
        Self {
            router: build_router(state),
            pool,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(test_request("GET", uri)).await
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

pub async fn seed_house(pool: &SqlitePool) {
    let members = [
        ("D1", "Ana", "Álvarez", "D", Some(1)),
        ("D2", "Ben", "Baker", "D", Some(2)),
        ("D3", "Cal", "Carter", "Democratic", Some(3)),
        ("R1", "Dee", "Dunn", "R", Some(4)),
        ("R2", "Eve", "Evans", "Republican", Some(5)),
        ("R3", "Fay", "Ford", "R", Some(6)),
        ("S1", "Gus", "Green", "D", None),
    ];
    for (id, first, last, party, district) in members {
        sqlx::query(
            "INSERT INTO members (member_id_bioguide, first, last, party, state, district) VALUES (?, ?, ?, ?, 'CA', ?)",
        )
        .bind(id)
        .bind(first)
        .bind(last)
        .bind(party)
        .bind(district)
        .execute(pool)
        .await
        .unwrap();
    }

    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('hr1-119', 119, 'house', 1, 'hr', 'Infrastructure Act', '2025-02-10', 'D1')").await;
    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('hr2-119', 119, 'house', 2, 'hr', NULL, '2025-02-20', 'R1')").await;
    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('hr3-119', 119, 'house', 3, 'hr', 'Bridges Act', '2025-02-22', 'D1')").await;
    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('s1-119', 119, 'senate', 1, 's', 'Senate Act', '2025-02-20', 'S1')").await;
    exec(pool, "INSERT INTO actions (bill_id, action_date, action_code, text) VALUES ('hr2-119', '2025-04-01', 'H30000', 'Passed')").await;

    let cosponsors = [
        ("hr1-119", "D2", "2025-02-11", 1),
        ("hr1-119", "R3", "2025-02-25", 0),
        ("hr1-119", "D1", "2025-02-11", 0),
        ("hr3-119", "D2", "2025-02-23", 1),
        ("hr2-119", "R2", "2025-02-21", 1),
    ];
    for (bill, member, date, original) in cosponsors {
        sqlx::query("INSERT INTO cosponsors (bill_id, member_id_bioguide, date, is_original) VALUES (?, ?, ?, ?)")
            .bind(bill)
            .bind(member)
            .bind(date)
            .bind(original)
            .execute(pool)
            .await
            .unwrap();
    }

    for n in 1..=ROLLCALLS {
        let rollcall_id = format!("rc-119-house-{:02}", n);
        let bill_id = (n == 1).then_some("hr1-119");
        sqlx::query(
            "INSERT INTO rollcalls (rollcall_id, congress, chamber, session, rc_number, date, question, bill_id) VALUES (?, 119, 'house', 1, ?, ?, ?, ?)",
        )
        .bind(&rollcall_id)
        .bind(n as i64)
        .bind(format!("2025-03-{:02}", n))
        .bind(format!("On Passage {}", n))
        .bind(bill_id)
        .execute(pool)
        .await
        .unwrap();

        for (member, vote) in [
            ("D1", "Yea"),
            ("D2", "Yea"),
            ("D3", if n == 1 { "Nay" } else { "Yea" }),
            ("R1", "Nay"),
            ("R2", "Nay"),
            ("R3", "Yea"),
        ] {
            sqlx::query("INSERT INTO votes (rollcall_id, member_id_bioguide, vote_code) VALUES (?, ?, ?)")
                .bind(&rollcall_id)
                .bind(member)
                .bind(vote)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    exec(pool, "INSERT INTO rollcalls (rollcall_id, congress, chamber, session, rc_number, date, question) VALUES ('rc-119-senate-01', 119, 'senate', 1, 1, '2025-03-01', 'On Cloture')").await;
    exec(pool, "INSERT INTO votes (rollcall_id, member_id_bioguide, vote_code) VALUES ('rc-119-senate-01', 'S1', 'Yea')").await;
}
