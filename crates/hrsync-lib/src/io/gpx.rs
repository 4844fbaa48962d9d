use crate::activity::Series;
use anyhow::{Context, Result};
use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write a Garmin-flavoured GPX 1.1 track.
///
/// Samples without a position are skipped. Heart rate and cadence go into a
/// `gpxtpx:TrackPointExtension`. Returns the number of points written.
pub fn write_gpx<W: Write>(series: &Series, out: W, name: &str) -> Result<usize> {
    let mut w = Writer::new_with_indent(out, b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut gpx = BytesStart::new("gpx");
    gpx.push_attribute(("version", "1.1"));
    gpx.push_attribute(("creator", "hrsync"));
    gpx.push_attribute(("xmlns", GPX_NS));
    gpx.push_attribute(("xmlns:gpxtpx", TPX_NS));
    w.write_event(Event::Start(gpx.borrow()))?;
    w.write_event(Event::Start(BytesStart::new("trk")))?;
    text_element(&mut w, "name", name)?;
    w.write_event(Event::Start(BytesStart::new("trkseg")))?;

    let mut written = 0;
    for sample in &series.samples {
        let (Some(lat), Some(lon)) = (sample.lat, sample.lon) else {
            continue;
        };
        let mut trkpt = BytesStart::new("trkpt");
        trkpt.push_attribute(("lat", lat.to_string().as_str()));
        trkpt.push_attribute(("lon", lon.to_string().as_str()));
        w.write_event(Event::Start(trkpt.borrow()))?;
        if let Some(ele) = sample.ele {
            text_element(&mut w, "ele", &ele.to_string())?;
        }
        if let Some(time) = sample.time {
            text_element(
                &mut w,
                "time",
                &time.to_rfc3339_opts(SecondsFormat::Secs, true),
            )?;
        }
        if sample.hr.is_some() || sample.cad.is_some() {
            let ext = BytesStart::new("gpxtpx:TrackPointExtension");
            w.write_event(Event::Start(BytesStart::new("extensions")))?;
            w.write_event(Event::Start(ext.borrow()))?;
            if let Some(hr) = sample.hr {
                text_element(&mut w, "gpxtpx:hr", &hr.to_string())?;
            }
            if let Some(cad) = sample.cad {
                text_element(&mut w, "gpxtpx:cad", &cad.to_string())?;
            }
            w.write_event(Event::End(ext.to_end()))?;
            w.write_event(Event::End(BytesEnd::new("extensions")))?;
        }
        w.write_event(Event::End(trkpt.to_end()))?;
        written += 1;
    }

    w.write_event(Event::End(BytesEnd::new("trkseg")))?;
    w.write_event(Event::End(BytesEnd::new("trk")))?;
    w.write_event(Event::End(gpx.to_end()))?;
    let mut out = w.into_inner();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(written)
}

pub fn save_gpx(series: &Series, path: &Path, name: &str) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_gpx(series, BufWriter::new(file), name)
        .with_context(|| format!("writing {}", path.display()))
}
