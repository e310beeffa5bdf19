use anyhow::{anyhow, Result};
use quick_xml::{
    events::{BytesStart, BytesText, Event},
    Reader,
};
use tracing::debug;

use crate::{
    model::Episode,
    util::{
        html::{decode_entities, normalize_description},
        youtube::extract_youtube_id,
    },
};

#[derive(Debug, Default)]
struct RawItem {
    guid: Option<String>,
    title: Option<String>,
    description: Option<String>,
    summary: Option<String>,
    content_encoded: Option<String>,
    pub_date: Option<String>,
    duration: Option<String>,
    enclosure_url: Option<String>,
    itunes_image: Option<String>,
    generic_image: Option<String>,
}

#[derive(Debug, Default)]
struct RawChannel {
    itunes_image: Option<String>,
    image_url: Option<String>,
}

/// Parse an RSS document into episodes, newest first in document order.
///
/// Missing item fields fall back to empty values; only a malformed document fails.
pub fn parse_episodes(xml: &str) -> Result<Vec<Episode>> {
    // text is trimmed once per element in `read_text`; per-event trimming
    // would glue words to neighbouring CDATA sections
    let mut reader = Reader::from_str(xml);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    let mut current: Option<RawItem> = None;
    let mut items: Vec<RawItem> = Vec::new();
    let mut channel = RawChannel::default();
    let mut saw_feed = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"rss" | b"channel" => saw_feed = true,
                    b"item" => current = Some(RawItem::default()),
                    _ => {}
                }
                read_attributes(&e, &name, &path, current.as_mut(), &mut channel);
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                read_attributes(&e, &name, &path, current.as_mut(), &mut channel);
            }
            Ok(Event::Text(e)) => text.push_str(&unescape_text(&e)),
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                let value = std::mem::take(&mut text);
                if name == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                    continue;
                }
                let parent = path.last().map(Vec::as_slice);
                read_text(&name, parent, value, current.as_mut(), &mut channel);
            }
            Ok(Event::Eof) => {
                // an element still open here means the body was cut off
                if let Some(open) = path.last() {
                    return Err(anyhow!(
                        "feed ended inside <{}>",
                        String::from_utf8_lossy(open)
                    ));
                }
                break;
            }
            Err(err) => {
                return Err(anyhow!(
                    "xml error at position {}: {}",
                    reader.buffer_position(),
                    err
                ))
            }
            _ => {}
        }
    }

    if !saw_feed {
        return Err(anyhow!("document is not an rss feed"));
    }

    debug!(count = items.len(), "parsed feed items");

    let channel_image = channel.itunes_image.or(channel.image_url);
    let total = items.len();
    let episodes = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| build_episode(item, total - index, channel_image.as_deref()))
        .collect();

    Ok(episodes)
}

fn build_episode(item: RawItem, number: usize, channel_image: Option<&str>) -> Episode {
    let episode_number = u32::try_from(number).unwrap_or(u32::MAX);

    let raw_description = item
        .description
        .or(item.summary)
        .or_else(|| item.content_encoded.clone())
        .unwrap_or_default();
    let description = normalize_description(&raw_description);

    let youtube_id = extract_youtube_id(&description)
        .or_else(|| extract_youtube_id(&raw_description))
        .or_else(|| item.content_encoded.as_deref().and_then(extract_youtube_id));

    let image_url = item
        .itunes_image
        .or(item.generic_image)
        .or_else(|| channel_image.map(str::to_string));

    Episode {
        id: item.guid.unwrap_or_else(|| episode_number.to_string()),
        title: item.title.unwrap_or_default(),
        description,
        publish_date: item.pub_date.unwrap_or_default(),
        duration: item.duration.unwrap_or_default(),
        audio_url: item.enclosure_url.unwrap_or_default(),
        episode_number,
        image_url,
        youtube_id,
        slug: None,
    }
}

fn read_attributes(
    e: &BytesStart<'_>,
    name: &[u8],
    path: &[Vec<u8>],
    current: Option<&mut RawItem>,
    channel: &mut RawChannel,
) {
    let parent = path.last().map(Vec::as_slice);
    match current {
        Some(item) => match name {
            b"enclosure" => set_once(&mut item.enclosure_url, attribute(e, "url")),
            b"itunes:image" => set_once(&mut item.itunes_image, attribute(e, "href")),
            b"media:thumbnail" => set_once(&mut item.generic_image, attribute(e, "url")),
            b"media:content" if is_image_media(e) => {
                set_once(&mut item.generic_image, attribute(e, "url"))
            }
            b"image" => set_once(
                &mut item.generic_image,
                attribute(e, "href").or_else(|| attribute(e, "url")),
            ),
            _ => {}
        },
        None => {
            if name == b"itunes:image" && parent == Some(b"channel".as_slice()) {
                set_once(&mut channel.itunes_image, attribute(e, "href"));
            }
        }
    }
}

fn read_text(
    name: &[u8],
    parent: Option<&[u8]>,
    value: String,
    current: Option<&mut RawItem>,
    channel: &mut RawChannel,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let value = Some(value.to_string());

    match (current, parent) {
        (Some(item), Some(b"item")) => match name {
            b"guid" => item.guid = value,
            b"title" => item.title = value,
            b"description" => item.description = value,
            b"itunes:summary" => item.summary = value,
            b"content:encoded" => item.content_encoded = value,
            b"pubDate" => item.pub_date = value,
            b"itunes:duration" => item.duration = value,
            b"image" => set_once(&mut item.generic_image, value),
            _ => {}
        },
        (Some(item), Some(b"image")) if name == b"url" => set_once(&mut item.generic_image, value),
        (None, Some(b"image")) if name == b"url" => set_once(&mut channel.image_url, value),
        _ => {}
    }
}

fn is_image_media(e: &BytesStart<'_>) -> bool {
    attribute(e, "medium").is_some_and(|medium| medium.eq_ignore_ascii_case("image"))
        || attribute(e, "type").is_some_and(|kind| kind.starts_with("image/"))
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn unescape_text(e: &BytesText<'_>) -> String {
    // html entities such as &nbsp; are not xml entities and fail the xml unescaper
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => decode_entities(&String::from_utf8_lossy(e)),
    }
}

fn set_once(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}
