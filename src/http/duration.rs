//! Minimal ISO-8601 duration literal parser (`P[nD]T[nH][nM][nS]`), enough
//! for the subset of the grammar this API's query parameters actually use.

pub fn parse_iso8601_duration(s: &str) -> Option<chrono::Duration> {
    let s = s.trim();
    let rest = s.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = chrono::Duration::zero();

    if !date_part.is_empty() {
        total = total + parse_component(date_part, 'D', 86_400)?;
    }
    if let Some(time_part) = time_part {
        let mut remaining = time_part;
        if let Some((hours, rest)) = split_component(remaining, 'H') {
            total = total + chrono::Duration::seconds(hours * 3600);
            remaining = rest;
        }
        if let Some((minutes, rest)) = split_component(remaining, 'M') {
            total = total + chrono::Duration::seconds(minutes * 60);
            remaining = rest;
        }
        if let Some((seconds, rest)) = split_component(remaining, 'S') {
            total = total + chrono::Duration::seconds(seconds);
            remaining = rest;
        }
        if !remaining.is_empty() {
            return None;
        }
    }

    Some(total)
}

fn parse_component(s: &str, unit: char, secs_per_unit: i64) -> Option<chrono::Duration> {
    let (value, rest) = split_component(s, unit)?;
    if !rest.is_empty() {
        return None;
    }
    Some(chrono::Duration::seconds(value * secs_per_unit))
}

fn split_component(s: &str, unit: char) -> Option<(i64, &str)> {
    let idx = s.find(unit)?;
    let (num, rest) = s.split_at(idx);
    let value: i64 = num.parse().ok()?;
    Some((value, &rest[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours() {
        let d = parse_iso8601_duration("PT24H").unwrap();
        assert_eq!(d, chrono::Duration::hours(24));
    }

    #[test]
    fn parses_hours_and_minutes() {
        let d = parse_iso8601_duration("PT1H30M").unwrap();
        assert_eq!(d, chrono::Duration::minutes(90));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso8601_duration("not-a-duration").is_none());
    }
}
