//! Placeholder replacement inside one WordprocessingML part.
//!
//! The part is streamed event by event. Top-level paragraphs are buffered
//! until they close and split into their direct children. When the text of
//! a paragraph holds a known placeholder, the paragraph is cut at each
//! token: content around a token is written back from the original events
//! and the token itself becomes the patch's paragraphs. Paragraphs without
//! placeholders are written back unchanged.

use super::package::{MediaRegistry, PartRelationships};
use super::xml;
use super::ApplyOptions;
use crate::error::TemplateError;
use crate::model::{ParagraphNode, PatchSet, RunNode};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Display;
use std::ops::Range;
use std::sync::OnceLock;

/// First `wp:docPr` id handed out to inserted pictures.
const FIRST_DRAWING_ID: u32 = 10_000;

/// Paragraph children without visible content.
const PARAGRAPH_MARKERS: &[&[u8]] = &[
    b"w:bookmarkStart",
    b"w:bookmarkEnd",
    b"w:proofErr",
    b"w:permStart",
    b"w:permEnd",
    b"w:commentRangeStart",
    b"w:commentRangeEnd",
];

/// Run children without visible content.
const RUN_MARKERS: &[&[u8]] = &[b"w:lastRenderedPageBreak"];

/// State shared by every part of one package.
pub(crate) struct PatchContext<'p> {
    patches: &'p PatchSet,
    options: &'p ApplyOptions,
    /// Full token text for each placeholder name
    tokens: Vec<(String, &'p str)>,
    replaced: HashSet<String>,
    media: MediaRegistry,
    next_drawing_id: u32,
}

impl<'p> PatchContext<'p> {
    pub fn new(patches: &'p PatchSet, options: &'p ApplyOptions) -> Result<Self, TemplateError> {
        let delimiters = &options.placeholder_delimiters;
        if delimiters.start.is_empty() || delimiters.end.is_empty() {
            return Err(TemplateError::InvalidDelimiters(
                "start and end markers must not be empty".to_string(),
            ));
        }

        let tokens = patches
            .keys()
            .map(|name| (delimiters.token(name), name.as_str()))
            .collect();

        Ok(Self {
            patches,
            options,
            tokens,
            replaced: HashSet::new(),
            media: MediaRegistry::default(),
            next_drawing_id: FIRST_DRAWING_ID,
        })
    }

    /// Avoid media file names already present among the package entries.
    pub fn with_existing_media<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.media = MediaRegistry::with_existing(entries);
        self
    }

    /// Hand out drawing ids above `last`.
    pub fn reserve_drawing_ids(&mut self, last: u32) {
        self.next_drawing_id = self.next_drawing_id.max(last.saturating_add(1));
    }

    /// Check if a placeholder was replaced in any part.
    pub fn was_replaced(&self, name: &str) -> bool {
        self.replaced.contains(name)
    }

    /// Media collected so far.
    pub fn media(&self) -> &MediaRegistry {
        &self.media
    }

    fn can_replace(&self, name: &str) -> bool {
        self.options.recursive || !self.replaced.contains(name)
    }

    fn drawing_id(&mut self) -> u32 {
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        id
    }

    /// Known tokens in `text`, ordered by position and without overlaps.
    ///
    /// At equal positions the longer token wins.
    fn find_tokens(&self, text: &str) -> Vec<Token<'p>> {
        let mut hits: Vec<Token<'p>> = self
            .tokens
            .iter()
            .flat_map(|(token, name)| {
                let name = *name;
                text.match_indices(token.as_str()).map(move |(start, m)| Token {
                    start,
                    end: start + m.len(),
                    name,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.end.cmp(&a.end))
                .then(a.name.cmp(b.name))
        });

        let mut cursor = 0;
        hits.retain(|hit| {
            let keep = hit.start >= cursor;
            if keep {
                cursor = hit.end;
            }
            keep
        });
        hits
    }
}

/// A placeholder occurrence in paragraph text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'p> {
    start: usize,
    end: usize,
    name: &'p str,
}

/// Largest `wp:docPr` id used in a part.
pub(crate) fn last_drawing_id(xml: &str) -> Option<u32> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r#"<wp:docPr\b[^>]*?\sid="(\d+)""#).ok())
        .as_ref()?;
    re.captures_iter(xml)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .max()
}

/// Replace placeholders in one part.
///
/// Returns `None` when nothing in the part was replaced.
pub(crate) fn patch_part(
    xml: &str,
    part: &str,
    ctx: &mut PatchContext<'_>,
    rels: &mut PartRelationships,
) -> Result<Option<String>, TemplateError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut current: Option<ParagraphBuffer<'_>> = None;
    let mut changed = false;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(buffer) = current.as_mut() {
            if !buffer.push(event) {
                continue;
            }
            if let Some(buffer) = current.take() {
                match render_replacement(&buffer, part, ctx, rels)? {
                    Some(markup) => {
                        writer.get_mut().extend_from_slice(markup.as_bytes());
                        changed = true;
                    }
                    None => write_events(&mut writer, buffer.events, part)?,
                }
            }
            continue;
        }

        if let Event::Start(e) = &event {
            if e.name().as_ref() == b"w:p" {
                current = Some(ParagraphBuffer::new(event));
                continue;
            }
        }
        writer.write_event(event).map_err(|e| xml_error(part, e))?;
    }

    if let Some(buffer) = current.take() {
        write_events(&mut writer, buffer.events, part)?;
    }

    if !changed {
        return Ok(None);
    }
    String::from_utf8(writer.into_inner())
        .map(Some)
        .map_err(|e| xml_error(part, e))
}

fn render_replacement(
    buffer: &ParagraphBuffer<'_>,
    part: &str,
    ctx: &mut PatchContext<'_>,
    rels: &mut PartRelationships,
) -> Result<Option<String>, TemplateError> {
    let mut tokens = Vec::new();
    for token in ctx.find_tokens(&buffer.text) {
        if ctx.can_replace(token.name) {
            ctx.replaced.insert(token.name.to_string());
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return Ok(None);
    }

    let patches = ctx.patches;
    let paragraph_props = buffer
        .paragraph_props()
        .map(|events| buffer.serialize(events, part))
        .transpose()?;

    let mut blocks: Vec<(Option<&str>, String)> = Vec::new();
    // Markers wait for the next paragraph instead of opening an empty one
    let mut pending = String::new();

    for index in 0..=tokens.len() {
        let start = index.checked_sub(1).map_or(0, |prev| tokens[prev].end);
        let end = tokens.get(index).map_or(buffer.text.len(), |t| t.start);
        let segment = buffer.render_segment(&tokens, index, start..end, part)?;
        if segment.visible {
            let body = std::mem::take(&mut pending) + &segment.body;
            blocks.push((paragraph_props.as_deref(), body));
        } else {
            pending.push_str(&segment.body);
        }

        let Some(token) = tokens.get(index) else {
            break;
        };
        let Some(patch) = patches.get(token.name) else {
            continue;
        };

        let run_props = if ctx.options.keep_original_styles {
            buffer
                .props_at(token.start)
                .map(|events| buffer.serialize(events, part))
                .transpose()?
        } else {
            None
        };
        for paragraph in patch.paragraphs() {
            let runs = render_runs(paragraph, run_props.as_deref(), ctx, rels);
            blocks.push((None, std::mem::take(&mut pending) + &runs));
        }
        log::debug!("Replaced placeholder '{}' in {}", token.name, part);
    }

    // Containers such as table cells need at least one paragraph.
    if blocks.is_empty() || !pending.is_empty() {
        match blocks.last_mut() {
            Some((_, body)) => body.push_str(&pending),
            None => blocks.push((paragraph_props.as_deref(), pending)),
        }
    }

    Ok(Some(
        blocks
            .iter()
            .map(|(props, body)| xml::paragraph(*props, body))
            .collect(),
    ))
}

fn render_runs(
    paragraph: &ParagraphNode,
    run_props: Option<&str>,
    ctx: &mut PatchContext<'_>,
    rels: &mut PartRelationships,
) -> String {
    let mut runs = String::new();

    for run in &paragraph.children {
        match run {
            RunNode::Text(t) => runs.push_str(&xml::text_run(&t.text, run_props)),
            RunNode::Image(image) => {
                let index = ctx.media.register(&image.image, image.format);
                let target = ctx
                    .media
                    .get(index)
                    .map(|file| file.target())
                    .unwrap_or_default();
                let relationship = rels.image_relationship(index, &target);
                let id = ctx.drawing_id();
                runs.push_str(&xml::image_run(
                    &relationship,
                    id,
                    image.width(),
                    image.height(),
                    run_props,
                ));
            }
        }
    }

    runs
}

/// A direct child of a buffered paragraph, as a range of its events.
#[derive(Debug)]
enum Child {
    /// `w:pPr`
    Properties(Range<usize>),
    Run(RunSpan),
    /// Any other element; takes no room in the paragraph text
    Other {
        events: Range<usize>,
        offset: usize,
        visible: bool,
    },
}

#[derive(Debug)]
struct RunSpan {
    events: Range<usize>,
    /// Paragraph text covered by the run
    text: Range<usize>,
    props: Option<Range<usize>>,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PieceKind {
    /// `w:t`, which may be cut at a token boundary
    Text,
    /// `w:tab`, `w:br` or `w:cr`: one character of text
    Mark,
    /// Drawings, field characters and other run content
    Opaque,
}

/// A child element of a run.
#[derive(Debug)]
struct Piece {
    kind: PieceKind,
    events: Range<usize>,
    text: Range<usize>,
    visible: bool,
}

#[derive(Debug, Default)]
struct Segment {
    body: String,
    visible: bool,
}

/// Events of one top-level paragraph plus its structure.
struct ParagraphBuffer<'a> {
    events: Vec<Event<'a>>,
    /// Element depth, 1 directly inside the paragraph
    depth: usize,
    text: String,
    children: Vec<Child>,
    open: Option<Child>,
    piece: Option<Piece>,
    props_start: Option<usize>,
}

impl<'a> ParagraphBuffer<'a> {
    fn new(start: Event<'a>) -> Self {
        Self {
            events: vec![start],
            depth: 1,
            text: String::new(),
            children: Vec::new(),
            open: None,
            piece: None,
            props_start: None,
        }
    }

    /// Buffer an event. Returns true once the paragraph is closed.
    fn push(&mut self, event: Event<'a>) -> bool {
        let closed = self.observe(&event);
        self.events.push(event);
        closed
    }

    fn observe(&mut self, event: &Event<'a>) -> bool {
        let index = self.events.len();
        match event {
            Event::Start(e) => {
                self.open_element(e.name().as_ref(), index);
                self.depth += 1;
            }
            Event::Empty(e) => {
                self.open_element(e.name().as_ref(), index);
                self.close_element(index);
            }
            Event::End(_) => {
                self.depth -= 1;
                if self.depth == 0 {
                    return true;
                }
                self.close_element(index);
            }
            Event::Text(t) if self.in_text() => match t.unescape() {
                Ok(text) => self.text.push_str(&text),
                Err(_) => self.text.push_str(&String::from_utf8_lossy(t)),
            },
            // Text outside `w:t` is insignificant whitespace
            _ => {}
        }
        false
    }

    fn in_text(&self) -> bool {
        self.depth == 3
            && self
                .piece
                .as_ref()
                .is_some_and(|piece| piece.kind == PieceKind::Text)
    }

    fn open_element(&mut self, name: &[u8], index: usize) {
        let offset = self.text.len();
        match self.depth {
            1 => {
                self.open = Some(match name {
                    b"w:pPr" => Child::Properties(index..index),
                    b"w:r" => Child::Run(RunSpan {
                        events: index..index,
                        text: offset..offset,
                        props: None,
                        pieces: Vec::new(),
                    }),
                    _ => Child::Other {
                        events: index..index,
                        offset,
                        visible: !PARAGRAPH_MARKERS.contains(&name),
                    },
                });
            }
            2 if matches!(self.open, Some(Child::Run(_))) => {
                let (kind, text) = match name {
                    b"w:rPr" => {
                        self.props_start = Some(index);
                        return;
                    }
                    b"w:t" => (PieceKind::Text, offset..offset),
                    b"w:tab" => {
                        self.text.push('\t');
                        (PieceKind::Mark, offset..offset + 1)
                    }
                    b"w:br" | b"w:cr" => {
                        self.text.push('\n');
                        (PieceKind::Mark, offset..offset + 1)
                    }
                    _ => (PieceKind::Opaque, offset..offset),
                };
                self.piece = Some(Piece {
                    kind,
                    events: index..index,
                    text,
                    visible: !RUN_MARKERS.contains(&name),
                });
            }
            _ => {}
        }
    }

    fn close_element(&mut self, index: usize) {
        match self.depth {
            1 => {
                let Some(mut child) = self.open.take() else {
                    return;
                };
                match &mut child {
                    Child::Properties(events) | Child::Other { events, .. } => {
                        events.end = index + 1
                    }
                    Child::Run(run) => {
                        run.events.end = index + 1;
                        run.text.end = self.text.len();
                    }
                }
                self.children.push(child);
            }
            2 => {
                let Some(Child::Run(run)) = self.open.as_mut() else {
                    return;
                };
                if let Some(start) = self.props_start.take() {
                    run.props = Some(start..index + 1);
                } else if let Some(mut piece) = self.piece.take() {
                    piece.events.end = index + 1;
                    if piece.kind == PieceKind::Text {
                        piece.text.end = self.text.len();
                    }
                    run.pieces.push(piece);
                }
            }
            _ => {}
        }
    }

    fn runs(&self) -> impl Iterator<Item = &RunSpan> {
        self.children.iter().filter_map(|child| match child {
            Child::Run(run) => Some(run),
            _ => None,
        })
    }

    fn paragraph_props(&self) -> Option<Range<usize>> {
        self.children.iter().find_map(|child| match child {
            Child::Properties(events) => Some(events.clone()),
            _ => None,
        })
    }

    /// Properties of the run holding the text at `offset`.
    fn props_at(&self, offset: usize) -> Option<Range<usize>> {
        self.runs()
            .find(|run| run.text.contains(&offset))
            .and_then(|run| run.props.clone())
    }

    /// Render the paragraph content between two tokens.
    ///
    /// `index` is the number of tokens before the segment. Content without
    /// text belongs to the segment that follows every token starting before
    /// it.
    fn render_segment(
        &self,
        tokens: &[Token<'_>],
        index: usize,
        range: Range<usize>,
        part: &str,
    ) -> Result<Segment, TemplateError> {
        let owns = |offset: usize| tokens.iter().filter(|t| t.start < offset).count() == index;
        let mut segment = Segment::default();

        for child in &self.children {
            match child {
                Child::Properties(_) => {}
                Child::Other {
                    events,
                    offset,
                    visible,
                } => {
                    if owns(*offset) {
                        segment.body.push_str(&self.serialize(events.clone(), part)?);
                        segment.visible |= *visible;
                    }
                }
                Child::Run(run) => {
                    if let Some((markup, visible)) = self.render_run(run, &range, &owns, part)? {
                        segment.body.push_str(&markup);
                        segment.visible |= visible;
                    }
                }
            }
        }

        Ok(segment)
    }

    /// Render the part of a run inside `range`, keeping its properties.
    fn render_run(
        &self,
        run: &RunSpan,
        range: &Range<usize>,
        owns: &impl Fn(usize) -> bool,
        part: &str,
    ) -> Result<Option<(String, bool)>, TemplateError> {
        if run.pieces.is_empty() {
            if !owns(run.text.start) {
                return Ok(None);
            }
            return Ok(Some((self.serialize(run.events.clone(), part)?, false)));
        }

        let mut content = String::new();
        let mut emitted = false;
        let mut visible = false;

        for piece in &run.pieces {
            match piece.kind {
                PieceKind::Text if !piece.text.is_empty() => {
                    let start = piece.text.start.max(range.start);
                    let end = piece.text.end.min(range.end);
                    if start >= end {
                        continue;
                    }
                    if start == piece.text.start && end == piece.text.end {
                        content.push_str(&self.serialize(piece.events.clone(), part)?);
                    } else {
                        content.push_str(&xml::run_content(&self.text[start..end]));
                    }
                    emitted = true;
                    visible = true;
                }
                PieceKind::Mark => {
                    if range.start <= piece.text.start && piece.text.end <= range.end {
                        content.push_str(&self.serialize(piece.events.clone(), part)?);
                        emitted = true;
                        visible = true;
                    }
                }
                _ => {
                    if owns(piece.text.start) {
                        content.push_str(&self.serialize(piece.events.clone(), part)?);
                        emitted = true;
                        visible |= piece.visible && piece.kind == PieceKind::Opaque;
                    }
                }
            }
        }

        if !emitted {
            return Ok(None);
        }

        let open = self.serialize(run.events.start..run.events.start + 1, part)?;
        let props = match &run.props {
            Some(events) => self.serialize(events.clone(), part)?,
            None => String::new(),
        };
        Ok(Some((format!("{}{}{}</w:r>", open, props, content), visible)))
    }

    fn serialize(&self, events: Range<usize>, part: &str) -> Result<String, TemplateError> {
        let mut writer = Writer::new(Vec::new());
        for event in self.events.get(events).unwrap_or_default() {
            writer
                .write_event(event.clone())
                .map_err(|e| xml_error(part, e))?;
        }
        String::from_utf8(writer.into_inner()).map_err(|e| xml_error(part, e))
    }
}

fn write_events(
    writer: &mut Writer<Vec<u8>>,
    events: Vec<Event<'_>>,
    part: &str,
) -> Result<(), TemplateError> {
    for event in events {
        writer.write_event(event).map_err(|e| xml_error(part, e))?;
    }
    Ok(())
}

fn xml_error(part: &str, err: impl Display) -> TemplateError {
    TemplateError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}
