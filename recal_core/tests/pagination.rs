use anyhow::Result;

use recal_core::{of, parse_calendar, CalendarQuery, Component, OccurrenceId};

const TEN_WEEKS: &str = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:weekly@test\r\n\
DTSTART:20200106T090000Z\r\n\
DTEND:20200106T100000Z\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=10\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

fn query(calendar: &Component) -> CalendarQuery {
    of(calendar).build().unwrap()
}

fn dtstart(component: &Component) -> String {
    component.property("DTSTART").unwrap().value.clone()
}

#[test]
fn pages_of_one_walk_the_bounded_stream() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);

    // the fifth Monday is the upper bound
    let mut pages = query.paginate(
        1,
        Some("20200106".into()),
        Some("20200203T090000Z".into()),
        "",
    )?;

    let mut seen = Vec::new();
    loop {
        let page = pages.generate_next_page()?;
        if page.is_empty() {
            break;
        }
        assert_eq!(page.len(), 1);
        seen.push(dtstart(&page.components()[0]));
        if page.is_last() {
            break;
        }
        // every cursor can be parsed back and rendered again
        let id = OccurrenceId::from_string(page.next_page_id())?;
        assert_eq!(id.to_string(), page.next_page_id());
    }

    assert_eq!(
        seen,
        vec![
            "20200106T090000Z",
            "20200113T090000Z",
            "20200120T090000Z",
            "20200127T090000Z",
            "20200203T090000Z",
        ]
    );
    Ok(())
}

#[test]
fn a_cursor_resumes_the_walk_across_queries() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;

    let first_query = query(&calendar);
    let mut pages = first_query.paginate(3, None, None, "")?;
    let first_page = pages.generate_next_page()?;
    assert_eq!(first_page.len(), 3);
    assert!(first_page.has_next_page());
    let cursor = first_page.next_page_id().to_string();
    drop(pages);

    // a fresh query (think: a new request) continues where the page ended
    let second_query = query(&calendar);
    let mut pages = second_query.paginate(3, None, None, &cursor)?;
    let second_page = pages.generate_next_page()?;
    assert_eq!(
        second_page
            .components()
            .iter()
            .map(dtstart)
            .collect::<Vec<_>>(),
        vec![
            "20200127T090000Z",
            "20200203T090000Z",
            "20200210T090000Z",
        ]
    );
    Ok(())
}

#[test]
fn all_pages_concatenate_to_the_after_stream() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);

    let mut paged = Vec::new();
    let mut pages = query.paginate(4, None, None, "")?;
    loop {
        let page = pages.generate_next_page()?;
        if page.is_empty() {
            break;
        }
        paged.extend(page.components().iter().map(dtstart));
        if page.is_last() {
            break;
        }
    }

    let streamed: Vec<String> = query
        .after("20200101")?
        .map(|component| dtstart(&component.unwrap()))
        .collect();
    assert_eq!(paged, streamed);
    Ok(())
}

#[test]
fn a_cursor_cannot_reach_back_before_the_lower_bound() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);

    // walk from the very beginning to get a first-page cursor
    let mut pages = query.paginate(1, None, None, "")?;
    let first_page = pages.generate_next_page()?;
    let early_cursor = first_page.next_page_id().to_string();

    // a later lower bound wins over the fabricated early cursor
    let mut pages = query.paginate(1, Some("20200201".into()), None, &early_cursor)?;
    let page = pages.generate_next_page()?;
    assert_eq!(dtstart(&page.components()[0]), "20200203T090000Z");
    Ok(())
}

#[test]
fn an_occurrence_starting_exactly_at_the_upper_bound_is_the_last_page() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);

    // the first occurrence pulled starts exactly at latest_start
    let mut pages = query.paginate(
        1,
        Some("20200202".into()),
        Some("20200203T090000Z".into()),
        "",
    )?;
    let page = pages.generate_next_page()?;
    assert_eq!(page.len(), 1);
    assert_eq!(dtstart(&page.components()[0]), "20200203T090000Z");
    assert!(page.is_last());
    Ok(())
}

#[test]
fn a_lost_cursor_at_the_end_of_the_stream_keeps_the_tail() -> Result<()> {
    // two events share one start and nothing comes after them
    let source = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:a@test\r\n\
DTSTART:20200309T090000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:b@test\r\n\
DTSTART:20200309T090000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let calendar = parse_calendar(source)?;
    let query = query(&calendar);

    // the cursor's id matches neither event, only their shared start
    let fabricated = "VEVENT##2020-03-09T09:00:00#missing@test";
    let mut pages = query.paginate(5, None, None, fabricated)?;
    let page = pages.generate_next_page()?;
    let mut uids: Vec<String> = page
        .components()
        .iter()
        .map(|component| component.property("UID").unwrap().value.clone())
        .collect();
    uids.sort();
    assert_eq!(uids, vec!["a@test", "b@test"]);
    assert!(page.is_last());
    Ok(())
}

#[test]
fn a_page_size_of_zero_is_rejected() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);
    assert!(query.paginate(0, None, None, "").is_err());
    Ok(())
}

#[test]
fn a_deleted_cursor_target_continues_monotonically() -> Result<()> {
    let calendar = parse_calendar(TEN_WEEKS)?;
    let query = query(&calendar);

    // a cursor pointing between two occurrences: its exact target does not
    // exist, the walk continues from the next-later start
    let fabricated = "VEVENT##2020-01-15T09:00:00#weekly@test";
    let mut pages = query.paginate(1, None, None, fabricated)?;
    let page = pages.generate_next_page()?;
    assert_eq!(dtstart(&page.components()[0]), "20200120T090000Z");
    Ok(())
}
