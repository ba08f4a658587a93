//! Host-shaped inbox fixtures
//!
//! Builds a [`MemoryDocument`] laid out the way the webmail host renders its
//! message list: a loading marker, the message region holding an offscreen
//! copy of the list plus the visible one, and rows decorated with the
//! checkbox, star, importance marker, label chips, snippet, attachment icon
//! and hover toolbar the template synthesizer has to strip.
//!
//! The helpers on [`InboxHandles`] emulate what the host does at runtime
//! (new mail arriving, labels changing) so tests and the replay tool can
//! exercise the engine against a moving target.

use serde::{Deserialize, Serialize};

use super::{Document, HostError, MemoryDocument, NodeId, Position, Selector, VElement};

const DEFAULT_LABEL_BACKGROUND: &str = "#dddddd";
const DEFAULT_LABEL_FOREGROUND: &str = "#666666";

/// A recorded inbox: rows in host order, most recent first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxFixture {
    pub rows: Vec<FixtureRow>,
    /// Rows of the hidden list copy the host keeps mounted
    #[serde(default)]
    pub offscreen_rows: Vec<FixtureRow>,
}

/// One message row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRow {
    pub sender: String,
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    pub date: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub labels: Vec<FixtureLabel>,
    #[serde(default)]
    pub attachment: bool,
    #[serde(default = "default_thread_count")]
    pub thread_count: u32,
}

fn default_thread_count() -> u32 {
    1
}

/// A label chip as the host colors it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureLabel {
    pub name: String,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_foreground")]
    pub foreground: String,
}

fn default_background() -> String {
    DEFAULT_LABEL_BACKGROUND.to_string()
}

fn default_foreground() -> String {
    DEFAULT_LABEL_FOREGROUND.to_string()
}

impl FixtureLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background: default_background(),
            foreground: default_foreground(),
        }
    }

    pub fn colored(
        name: impl Into<String>,
        background: impl Into<String>,
        foreground: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            background: background.into(),
            foreground: foreground.into(),
        }
    }
}

impl FixtureRow {
    pub fn new(sender: impl Into<String>, subject: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            snippet: String::new(),
            date: date.into(),
            unread: false,
            labels: Vec::new(),
            attachment: false,
            thread_count: 1,
        }
    }

    /// Builder method to mark the row unread
    pub fn unread(mut self) -> Self {
        self.unread = true;
        self
    }

    /// Builder method to add a label with default colors
    pub fn label(mut self, name: impl Into<String>) -> Self {
        self.labels.push(FixtureLabel::new(name));
        self
    }

    /// Builder method to add a colored label
    pub fn colored_label(mut self, label: FixtureLabel) -> Self {
        self.labels.push(label);
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_attachment(mut self) -> Self {
        self.attachment = true;
        self
    }

    pub fn thread_count(mut self, count: u32) -> Self {
        self.thread_count = count;
        self
    }
}

/// Handles into a built inbox, plus host emulation helpers
#[derive(Debug, Clone)]
pub struct InboxHandles {
    pub loading: NodeId,
    pub region: NodeId,
    /// The visible list container
    pub list: NodeId,
    /// Parent element of the visible rows
    pub body: NodeId,
    pub offscreen: Option<NodeId>,
    /// Visible rows at build time, in order
    pub rows: Vec<NodeId>,
    next_row: usize,
}

/// Builds host-shaped inbox documents
pub struct InboxBuilder;

impl InboxBuilder {
    /// Build a document for the fixture; the loading marker starts out shown
    pub fn build(fixture: &InboxFixture) -> Result<(MemoryDocument, InboxHandles), HostError> {
        let mut doc = MemoryDocument::new();
        let root = doc.root();

        let loading = doc.append(root, &VElement::new("div").attr("id", "loading").text("Loading…"))?;
        let region = doc.append(root, &VElement::new("div").attr("class", "AO"))?;

        let mut next_row = 0;
        let offscreen = if fixture.offscreen_rows.is_empty() {
            None
        } else {
            let (container, body) = Self::list(&mut doc, region, true)?;
            for row in &fixture.offscreen_rows {
                doc.append(body, &Self::row_element(row, next_row))?;
                next_row += 1;
            }
            Some(container)
        };

        let (list, body) = Self::list(&mut doc, region, false)?;
        let mut rows = Vec::with_capacity(fixture.rows.len());
        for row in &fixture.rows {
            rows.push(doc.append(body, &Self::row_element(row, next_row))?);
            next_row += 1;
        }

        // Building is not something an observer should see
        doc.take_mutations();

        Ok((
            doc,
            InboxHandles {
                loading,
                region,
                list,
                body,
                offscreen,
                rows,
                next_row,
            },
        ))
    }

    fn list(
        doc: &mut MemoryDocument,
        region: NodeId,
        hidden: bool,
    ) -> Result<(NodeId, NodeId), HostError> {
        let mut container = VElement::new("div").attr("class", "ae4");
        if hidden {
            container.set_attribute("style", "display: none;");
        }
        let container = doc.append(region, &container)?;
        let table = doc.append(container, &VElement::new("table").attr("class", "F"))?;
        let body = doc.append(table, &VElement::new("tbody"))?;
        Ok((container, body))
    }

    /// Markup for one row, with every decoration the host renders
    pub fn row_element(row: &FixtureRow, index: usize) -> VElement {
        let class = if row.unread { "zA zE" } else { "zA yO" };

        let mut sender = VElement::new("div").attr("class", "yW").child(
            VElement::new("span")
                .attr("class", "yP")
                .attr("name", row.sender.clone())
                .text(row.sender.clone()),
        );
        sender = sender.child(
            VElement::new("span")
                .attr("class", "afn")
                .text(format!("{}, ", row.sender)),
        );
        if row.thread_count > 1 {
            sender = sender.child(
                VElement::new("span")
                    .attr("class", "bx0")
                    .text(row.thread_count.to_string()),
            );
        }

        let mut subject_area = VElement::new("div").attr("class", "xT");
        for label in &row.labels {
            subject_area = subject_area.child(Self::chip_element(label));
        }
        let mut subject = VElement::new("div").attr("class", "y6").child(
            VElement::new("span")
                .attr("class", "bog")
                .attr("id", format!("row-{}-subject", index))
                .text(row.subject.clone()),
        );
        if !row.snippet.is_empty() {
            subject = subject.child(
                VElement::new("span")
                    .attr("class", "y2")
                    .text(format!(" - {}", row.snippet)),
            );
        }
        subject_area = subject_area.child(subject);
        let mut subject_cell = VElement::new("td")
            .attr("class", "xY a4W")
            .child(VElement::new("div").attr("class", "xS").child(subject_area));
        if row.attachment {
            subject_cell = subject_cell.child(
                VElement::new("div")
                    .attr("class", "brd")
                    .attr("aria-label", "Attachment"),
            );
        }

        VElement::new("tr")
            .attr("class", class)
            .attr("id", format!("row-{}", index))
            .attr("jsaction", "click:open_thread")
            .attr("data-thread-id", format!("thread-{}", index))
            .attr("aria-labelledby", format!("row-{}-subject", index))
            .attr("role", "row")
            .attr("tabindex", "-1")
            .child(
                VElement::new("td")
                    .attr("class", "oZ-x3 xY")
                    .attr("role", "gridcell")
                    .child(
                        VElement::new("div")
                            .attr("role", "checkbox")
                            .attr("aria-checked", "false"),
                    ),
            )
            .child(
                VElement::new("td")
                    .attr("class", "apU xY")
                    .child(VElement::new("span").attr("aria-label", "Not starred")),
            )
            .child(
                VElement::new("td")
                    .attr("class", "WA xY")
                    .child(VElement::new("div").attr("class", "pG")),
            )
            .child(VElement::new("td").attr("class", "yX xY").child(sender))
            .child(subject_cell)
            .child(
                VElement::new("td").attr("class", "xW xY").child(
                    VElement::new("span")
                        .attr("title", row.date.clone())
                        .text(row.date.clone()),
                ),
            )
            .child(
                VElement::new("td").attr("class", "bq4 xY").child(
                    VElement::new("ul")
                        .attr("role", "toolbar")
                        .child(VElement::new("li").attr("data-tooltip", "Archive")),
                ),
            )
    }

    fn chip_element(label: &FixtureLabel) -> VElement {
        VElement::new("div")
            .attr("class", "ar as")
            .attr(
                "style",
                format!("background-color: {}; color: {};", label.background, label.foreground),
            )
            .child(VElement::new("div").attr("class", "av").text(label.name.clone()))
    }
}

impl InboxHandles {
    /// Hide the loading marker, as the host does once the list is ready
    pub fn finish_loading(&self, doc: &mut MemoryDocument) -> Result<(), HostError> {
        doc.set_style(self.loading, "display", Some("none"))
    }

    /// New mail arriving at the top of the visible list
    pub fn prepend_row(
        &mut self,
        doc: &mut MemoryDocument,
        row: &FixtureRow,
    ) -> Result<NodeId, HostError> {
        let element = InboxBuilder::row_element(row, self.next_row);
        self.next_row += 1;
        match doc.child_elements(self.body).first() {
            Some(&first) => doc.insert(Position::Before(first), &element),
            None => doc.append(self.body, &element),
        }
    }

    /// Mail arriving below an existing row
    pub fn insert_row_after(
        &mut self,
        doc: &mut MemoryDocument,
        after: NodeId,
        row: &FixtureRow,
    ) -> Result<NodeId, HostError> {
        let element = InboxBuilder::row_element(row, self.next_row);
        self.next_row += 1;
        doc.insert(Position::After(after), &element)
    }

    /// Replace a row's label chips
    pub fn set_labels(
        &self,
        doc: &mut MemoryDocument,
        row: NodeId,
        labels: &[FixtureLabel],
    ) -> Result<(), HostError> {
        for existing in doc.query_all(row, &Selector::class("ar")) {
            doc.remove(existing)?;
        }
        let anchor = doc.query(row, &Selector::class("y6")).ok_or_else(|| HostError::MissingStructure {
            node: row,
            what: "subject area".to_string(),
        })?;
        for label in labels {
            doc.insert(Position::Before(anchor), &InboxBuilder::chip_element(label))?;
        }
        Ok(())
    }

    pub fn set_unread(
        &self,
        doc: &mut MemoryDocument,
        row: NodeId,
        unread: bool,
    ) -> Result<(), HostError> {
        if unread {
            doc.remove_class(row, "yO")?;
            doc.add_class(row, "zE")
        } else {
            doc.remove_class(row, "zE")?;
            doc.add_class(row, "yO")
        }
    }
}
