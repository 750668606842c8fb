//! Seed data shared by the integration suites
//!
//! House, 119th Congress, twelve roll calls in March 2025:
//! - D1, D2 always vote Yea; D3 breaks ranks on the first roll call only
//! - R1, R2 always vote Nay; R3 always votes with the Democrats
//! - S1 is a senator whose votes are recorded on a Senate roll call

#![allow(dead_code)]

use cct_common::db::init::init_database;
use sqlx::SqlitePool;
use std::path::Path;

pub const ROLLCALLS: usize = 12;

pub async fn open(dir: &Path) -> SqlitePool {
    init_database(&dir.join("cct.db")).await.unwrap()
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
    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('hr2-119', 119, 'house', 2, 'hr', 'Farm Act', '2025-02-20', 'R1')").await;
    exec(pool, "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date, sponsor_bioguide) VALUES ('s1-119', 119, 'senate', 1, 's', 'Senate Act', '2025-02-20', 'S1')").await;
    exec(pool, "INSERT INTO actions (bill_id, action_date, action_code, text) VALUES ('hr1-119', '2025-03-05', 'H11100', 'Referred')").await;
    exec(pool, "INSERT INTO actions (bill_id, action_date, action_code, text) VALUES ('hr2-119', '2025-02-21', 'H11100', 'Referred')").await;
    exec(pool, "INSERT INTO actions (bill_id, action_date, action_code, text) VALUES ('hr2-119', '2025-04-01', 'H30000', 'Passed')").await;
    exec(pool, "INSERT INTO bill_subjects (bill_id, subject_term) VALUES ('hr1-119', 'Transportation')").await;
    exec(pool, "INSERT INTO bill_subjects (bill_id, subject_term) VALUES ('hr2-119', 'Agriculture')").await;
    for (bill, member) in [("hr1-119", "D2"), ("hr1-119", "R3"), ("hr2-119", "R2")] {
        sqlx::query("INSERT INTO cosponsors (bill_id, member_id_bioguide, date) VALUES (?, ?, '2025-02-25')")
            .bind(bill)
            .bind(member)
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
