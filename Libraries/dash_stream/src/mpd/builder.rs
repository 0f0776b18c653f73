use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// One adaptation set of a period.
#[derive(Debug, Clone)]
pub struct AdaptationDef {
    pub id: String,
    pub mime_type: String,
    pub codecs: Option<String>,
    pub content_type: Option<String>,
    pub protected: bool,
    /// Content types of ContentComponent children, for multiplexed sets.
    pub components: Vec<String>,
    /// (id, bandwidth) of every representation.
    pub representations: Vec<(String, u64)>,
}

impl AdaptationDef {
    pub fn new(id: &str, mime_type: &str, codecs: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            mime_type: mime_type.to_string(),
            codecs: codecs.map(str::to_string),
            content_type: None,
            protected: false,
            components: vec![],
            representations: vec![],
        }
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn component(mut self, content_type: &str) -> Self {
        self.components.push(content_type.to_string());
        self
    }

    pub fn representation(mut self, id: &str, bandwidth: u64) -> Self {
        self.representations.push((id.to_string(), bandwidth));
        self
    }
}

/// An inline event stream: (id, presentation time, duration) in `timescale` units.
#[derive(Debug, Clone)]
pub struct EventStreamDef {
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u64,
    pub events: Vec<(u64, u64, u64)>,
}

impl EventStreamDef {
    pub fn new(scheme_id_uri: &str, value: &str, timescale: u64) -> Self {
        Self {
            scheme_id_uri: scheme_id_uri.to_string(),
            value: value.to_string(),
            timescale,
            events: vec![],
        }
    }

    pub fn event(mut self, id: u64, presentation_time: u64, duration: u64) -> Self {
        self.events.push((id, presentation_time, duration));
        self
    }
}

#[derive(Debug, Clone)]
pub struct PeriodDef {
    pub id: String,
    pub start: f64,
    pub duration: Option<f64>,
    pub adaptations: Vec<AdaptationDef>,
    pub event_streams: Vec<EventStreamDef>,
}

impl PeriodDef {
    pub fn new(id: &str, start: f64) -> Self {
        Self {
            id: id.to_string(),
            start,
            duration: None,
            adaptations: vec![],
            event_streams: vec![],
        }
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn adaptation(mut self, adaptation: AdaptationDef) -> Self {
        self.adaptations.push(adaptation);
        self
    }

    pub fn event_stream(mut self, stream: EventStreamDef) -> Self {
        self.event_streams.push(stream);
        self
    }
}

/// Main MPD builder
#[derive(Debug, Clone)]
pub struct MpdBuilder {
    pub dynamic: bool,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub media_presentation_duration: Option<f64>,
    pub minimum_update_period: Option<f64>,
    pub location: Option<String>,
    pub periods: Vec<PeriodDef>,
}

impl MpdBuilder {
    /**
     * An on-demand presentation of the given length in seconds.
     */
    pub fn on_demand(duration: f64) -> Self {
        Self {
            dynamic: false,
            availability_start_time: None,
            media_presentation_duration: Some(duration),
            minimum_update_period: None,
            location: None,
            periods: vec![],
        }
    }

    /**
     * A live presentation that became available now and should be refreshed
     * every `minimum_update_period` seconds.
     */
    pub fn live(minimum_update_period: f64) -> Self {
        Self {
            dynamic: true,
            availability_start_time: Some(Utc::now()),
            media_presentation_duration: None,
            minimum_update_period: Some(minimum_update_period),
            location: None,
            periods: vec![],
        }
    }

    /**
     * Set the Location the manifest should be reloaded from.
     */
    pub fn location(mut self, url: &str) -> Self {
        self.location = Some(url.to_string());
        self
    }

    pub fn period(mut self, period: PeriodDef) -> Self {
        self.periods.push(period);
        self
    }

    /**
     * Build the MPD XML string.
     */
    pub fn build_xml_string(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        let mut mpd = BytesStart::new("MPD");
        mpd.push_attribute(("xmlns", "urn:mpeg:dash:schema:mpd:2011"));
        mpd.push_attribute(("type", if self.dynamic { "dynamic" } else { "static" }));
        if let Some(ast) = self.availability_start_time {
            mpd.push_attribute(("availabilityStartTime", ast.to_rfc3339().as_str()));
        }
        if let Some(v) = self.media_presentation_duration {
            mpd.push_attribute(("mediaPresentationDuration", format!("PT{}S", v).as_str()));
        }
        if let Some(v) = self.minimum_update_period {
            mpd.push_attribute(("minimumUpdatePeriod", format!("PT{}S", v).as_str()));
        }
        writer.write_event(Event::Start(mpd))?;

        if let Some(location) = &self.location {
            writer.write_event(Event::Start(BytesStart::new("Location")))?;
            writer.write_event(Event::Text(BytesText::new(location)))?;
            writer.write_event(Event::End(BytesEnd::new("Location")))?;
        }

        for period in &self.periods {
            let mut period_el = BytesStart::new("Period");
            period_el.push_attribute(("id", period.id.as_str()));
            period_el.push_attribute(("start", format!("PT{}S", period.start).as_str()));
            if let Some(d) = period.duration {
                period_el.push_attribute(("duration", format!("PT{}S", d).as_str()));
            }
            writer.write_event(Event::Start(period_el))?;

            for stream in &period.event_streams {
                let mut stream_el = BytesStart::new("EventStream");
                stream_el.push_attribute(("schemeIdUri", stream.scheme_id_uri.as_str()));
                stream_el.push_attribute(("value", stream.value.as_str()));
                stream_el.push_attribute(("timescale", stream.timescale.to_string().as_str()));
                writer.write_event(Event::Start(stream_el))?;
                for (id, presentation_time, duration) in &stream.events {
                    let mut event = BytesStart::new("Event");
                    event.push_attribute(("id", id.to_string().as_str()));
                    event.push_attribute(("presentationTime", presentation_time.to_string().as_str()));
                    event.push_attribute(("duration", duration.to_string().as_str()));
                    writer.write_event(Event::Empty(event))?;
                }
                writer.write_event(Event::End(BytesEnd::new("EventStream")))?;
            }

            for adaptation in &period.adaptations {
                let mut adaptation_el = BytesStart::new("AdaptationSet");
                adaptation_el.push_attribute(("id", adaptation.id.as_str()));
                adaptation_el.push_attribute(("mimeType", adaptation.mime_type.as_str()));
                if let Some(codecs) = &adaptation.codecs {
                    adaptation_el.push_attribute(("codecs", codecs.as_str()));
                }
                if let Some(content_type) = &adaptation.content_type {
                    adaptation_el.push_attribute(("contentType", content_type.as_str()));
                }
                writer.write_event(Event::Start(adaptation_el))?;

                if adaptation.protected {
                    let mut protection = BytesStart::new("ContentProtection");
                    protection.push_attribute(("schemeIdUri", "urn:mpeg:dash:mp4protection:2011"));
                    protection.push_attribute(("value", "cenc"));
                    writer.write_event(Event::Empty(protection))?;
                }
                for component in &adaptation.components {
                    let mut component_el = BytesStart::new("ContentComponent");
                    component_el.push_attribute(("contentType", component.as_str()));
                    writer.write_event(Event::Empty(component_el))?;
                }
                for (id, bandwidth) in &adaptation.representations {
                    let mut rep_el = BytesStart::new("Representation");
                    rep_el.push_attribute(("id", id.as_str()));
                    rep_el.push_attribute(("bandwidth", bandwidth.to_string().as_str()));
                    writer.write_event(Event::Empty(rep_el))?;
                }

                writer.write_event(Event::End(BytesEnd::new("AdaptationSet")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("Period")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("MPD")))?;

        let result = writer.into_inner().into_inner();
        Ok(String::from_utf8(result)?)
    }
}
