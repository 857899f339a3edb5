#![allow(missing_docs)]

pub(crate) mod stub_api;

pub(crate) use stub_api::StubApi;

use time::macros::date;

use crate::{
    query_store::{QueryStateHandle, QueryStateStore},
    storage::MemoryStorage,
    transaction::{StatusField, Transaction},
};

pub(crate) fn get_test_handle() -> QueryStateHandle {
    QueryStateHandle::load(QueryStateStore::new(MemoryStorage::new()))
}

/// Ten transactions in March 2024 with amounts 10, 20, ..., 100.
///
/// Even IDs are business, #3 is locked, #5 is hidden and #7 is flagged.
pub(crate) fn sample_transactions() -> Vec<Transaction> {
    (1..=10)
        .map(|id| {
            let day = time::Date::from_calendar_date(2024, time::Month::March, id as u8)
                .unwrap_or(date!(2024 - 03 - 01));
            Transaction::build(id, 10.0 * id as f64, day, &format!("TRANSACTION {id}"))
                .business(id % 2 == 0)
                .status(StatusField::Lock, id == 3)
                .status(StatusField::Hidden, id == 5)
                .status(StatusField::Flag, id == 7)
                .finalize()
        })
        .collect()
}
