//! Scenarios over `SectorTable` (§3.7): the potentially-visible-sector
//! relation that `crate::light::lists` consults to decide which sectors'
//! light lists a given light lands in. No GPU device is needed to exercise
//! this piece, since the table is pure host-side bookkeeping.

use rtcore::error::RtError;
use rtcore::sector::{SectorTable, IMPLICIT_SECTOR};

#[test]
fn visibility_is_not_transitively_closed() {
    // 1 <-> 2 and 2 <-> 3 declared, but never 1 <-> 3.
    let mut table = SectorTable::new(16);
    table.set_visible(1, 2).unwrap();
    table.set_visible(2, 3).unwrap();

    let mut from_1: Vec<_> = table.affected_sectors(1).collect();
    from_1.sort();
    assert_eq!(from_1, vec![1, 2], "sector 1 must not see sector 3 through 2");

    let mut from_2: Vec<_> = table.affected_sectors(2).collect();
    from_2.sort();
    assert_eq!(from_2, vec![1, 2, 3]);
}

/// A light placed in a sector with no declared visibility edges is only
/// ever appended to that one sector's list.
#[test]
fn isolated_sector_only_affects_itself() {
    let mut table = SectorTable::new(16);
    table.declare(9).unwrap();
    assert_eq!(table.affected_sectors(9).collect::<Vec<_>>(), vec![9]);
}

/// The implicit sector always exists and is visible to itself even across
/// a `reset`, matching §3.7's "sector 0 always exists" rule.
#[test]
fn implicit_sector_survives_reset() {
    let mut table = SectorTable::new(4);
    table.declare(1).unwrap();
    table.declare(2).unwrap();
    assert_eq!(table.sector_count(), 3);

    table.reset();
    assert_eq!(table.sector_count(), 1);
    assert_eq!(table.affected_sectors(IMPLICIT_SECTOR).collect::<Vec<_>>(), vec![IMPLICIT_SECTOR]);
}

/// §8.3-style boundary: declaring one sector beyond capacity is rejected
/// and leaves every previously-declared sector queryable.
#[test]
fn declaring_past_capacity_keeps_existing_sectors_intact() {
    let mut table = SectorTable::new(2);
    table.declare(5).unwrap();
    // capacity is 2 and sector 0 (implicit) already counts as one slot.
    let err = table.declare(6).unwrap_err();
    assert!(matches!(err, RtError::TooManySectors { .. }));

    let mut declared: Vec<_> = table.sectors().collect();
    declared.sort();
    assert_eq!(declared, vec![IMPLICIT_SECTOR, 5]);
}

/// `sectors()` always yields ascending order, the stable order
/// `LightLists` assigns region indices by.
#[test]
fn sectors_iterate_in_ascending_order() {
    let mut table = SectorTable::new(16);
    for id in [40, 3, 17, 1] {
        table.declare(id).unwrap();
    }
    let ids: Vec<_> = table.sectors().collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

/// Declaring the same sector twice is idempotent and never consumes
/// capacity a second time.
#[test]
fn redeclaring_a_sector_is_idempotent() {
    let mut table = SectorTable::new(2);
    table.declare(5).unwrap();
    table.declare(5).unwrap();
    table.declare(5).unwrap();
    assert_eq!(table.sector_count(), 2);
}
