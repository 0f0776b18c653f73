use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::mpd::{
    AdaptationSet, EventStream, InlineEvent, Manifest, Period, PresentationType, Representation,
};

type ParseResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Default)]
struct ParseState {
    location: Option<String>,
    in_location: bool,
    periods: Vec<Period>,
    period: Option<Period>,
    adaptation: Option<AdaptationSet>,
    event_stream: Option<EventStream>,
    /// Events seen so far in the current period, across all of its event streams.
    period_events: u64,
}

/// Parses an MPD document loaded from `url`.
pub fn parse_mpd(xml: &str, url: &str) -> ParseResult<Manifest> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut state = ParseState::default();
    let mut manifest = Manifest {
        url: url.to_string(),
        location: None,
        presentation_type: PresentationType::Static,
        availability_start_time: None,
        media_presentation_duration: None,
        minimum_update_period: None,
        periods: vec![],
    };
    let mut saw_mpd = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                if e.name().as_ref() == b"MPD" {
                    saw_mpd = true;
                    read_mpd_attributes(e, &mut manifest)?;
                } else {
                    open_element(e, &mut state)?;
                }
            }
            Event::Empty(ref e) => {
                if e.name().as_ref() == b"MPD" {
                    saw_mpd = true;
                    read_mpd_attributes(e, &mut manifest)?;
                }
                open_element(e, &mut state)?;
                let name = e.name().to_owned();
                close_element(std::str::from_utf8(name.as_ref())?, &mut state);
            }
            Event::Text(ref e) => {
                if state.in_location {
                    let text = e.unescape()?.trim().to_string();
                    if !text.is_empty() {
                        state.location = Some(text);
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.name().to_owned();
                close_element(std::str::from_utf8(name.as_ref())?, &mut state);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_mpd {
        return Err("document has no MPD element".into());
    }

    manifest.location = state.location;
    manifest.periods = state.periods;
    Ok(manifest)
}

fn attributes(e: &BytesStart) -> ParseResult<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.to_string();
        map.insert(key, value);
    }
    Ok(map)
}

fn read_mpd_attributes(e: &BytesStart, manifest: &mut Manifest) -> ParseResult<()> {
    let map = attributes(e)?;
    if map.get("type").map(String::as_str) == Some("dynamic") {
        manifest.presentation_type = PresentationType::Dynamic;
    }
    if let Some(ast) = map.get("availabilityStartTime") {
        manifest.availability_start_time = Some(ast.parse::<DateTime<Utc>>()?);
    }
    manifest.media_presentation_duration = map
        .get("mediaPresentationDuration")
        .and_then(|v| parse_duration(v));
    manifest.minimum_update_period = map.get("minimumUpdatePeriod").and_then(|v| parse_duration(v));
    Ok(())
}

fn open_element(e: &BytesStart, state: &mut ParseState) -> ParseResult<()> {
    let name = e.name().to_owned();
    let tag = std::str::from_utf8(name.as_ref())?;

    match tag {
        "Location" => state.in_location = true,
        "Period" => {
            let map = attributes(e)?;
            state.period_events = 0;
            state.period = Some(Period {
                id: map.get("id").cloned(),
                start: map.get("start").and_then(|v| parse_duration(v)),
                duration: map.get("duration").and_then(|v| parse_duration(v)),
                ..Default::default()
            });
        }
        "AdaptationSet" => {
            let map = attributes(e)?;
            state.adaptation = Some(AdaptationSet {
                id: map.get("id").cloned(),
                content_type: map.get("contentType").cloned(),
                mime_type: map.get("mimeType").cloned().unwrap_or_default(),
                codecs: map.get("codecs").cloned(),
                ..Default::default()
            });
        }
        "ContentProtection" => {
            if let Some(adaptation) = state.adaptation.as_mut() {
                adaptation.content_protection = true;
            }
        }
        "ContentComponent" => {
            let map = attributes(e)?;
            if let (Some(adaptation), Some(kind)) = (state.adaptation.as_mut(), map.get("contentType")) {
                adaptation.component_types.push(kind.clone());
            }
        }
        "Representation" => {
            let map = attributes(e)?;
            let representation = Representation {
                id: map.get("id").cloned().unwrap_or_default(),
                bandwidth: match map.get("bandwidth") {
                    Some(b) => b.parse::<u64>()?,
                    None => 0,
                },
                codecs: map.get("codecs").cloned(),
                mime_type: map.get("mimeType").cloned(),
            };
            if let Some(adaptation) = state.adaptation.as_mut() {
                if adaptation.mime_type.is_empty() {
                    if let Some(mime) = &representation.mime_type {
                        adaptation.mime_type = mime.clone();
                    }
                }
                adaptation.representations.push(representation);
            }
        }
        "EventStream" => {
            let map = attributes(e)?;
            state.event_stream = Some(EventStream {
                scheme_id_uri: map.get("schemeIdUri").cloned().unwrap_or_default(),
                value: map.get("value").cloned().unwrap_or_default(),
                timescale: parse_number(&map, "timescale", 1)?,
                events: vec![],
            });
        }
        "Event" => {
            let map = attributes(e)?;
            if let Some(stream) = state.event_stream.as_mut() {
                // Ids default to the event's position in the period so that events of
                // different streams never share one.
                let id = parse_number(&map, "id", state.period_events)?;
                state.period_events += 1;
                stream.events.push(InlineEvent {
                    id,
                    presentation_time: parse_number(&map, "presentationTime", 0)?,
                    duration: parse_number(&map, "duration", 0)?,
                });
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_element(tag: &str, state: &mut ParseState) {
    match tag {
        "Location" => state.in_location = false,
        "AdaptationSet" => {
            if let (Some(adaptation), Some(period)) = (state.adaptation.take(), state.period.as_mut()) {
                period.adaptation_sets.push(adaptation);
            }
        }
        "EventStream" => {
            if let (Some(stream), Some(period)) = (state.event_stream.take(), state.period.as_mut()) {
                period.event_streams.push(stream);
            }
        }
        "Period" => {
            if let Some(period) = state.period.take() {
                state.periods.push(period);
            }
        }
        _ => {}
    }
}

fn parse_number(map: &HashMap<String, String>, key: &str, default: u64) -> ParseResult<u64> {
    match map.get(key) {
        Some(value) => Ok(value
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid {key} \"{value}\": {e}"))?),
        None => Ok(default),
    }
}

fn parse_duration(value: &str) -> Option<f64> {
    let iso = iso8601_duration::Duration::parse(value).ok()?;
    iso.to_std().map(|d| d.as_secs_f64())
}
