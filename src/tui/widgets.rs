//! TUI widget rendering: header, transcript, input area, status bar.

use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::message::OracleMessage;
use crate::oracle::{OracleState, OracleStatus};

/// Render a single message as styled lines. Multi-line replies keep their
/// line breaks; the label only prefixes the first line.
pub fn message_to_lines(msg: &OracleMessage) -> Vec<Line<'static>> {
    match msg {
        OracleMessage::User { text } => labelled("you ", Color::Green, text),
        OracleMessage::Assistant { text } | OracleMessage::Token { text } => {
            labelled("oracle ", Color::Cyan, text)
        }
        OracleMessage::System { text } => text
            .lines()
            .map(|l| {
                Line::from(Span::styled(
                    l.to_string(),
                    Style::default().fg(Color::DarkGray),
                ))
            })
            .collect(),
        OracleMessage::Error {
            code,
            message,
            help,
        } => {
            let mut spans = vec![
                Span::styled(
                    format!("[error:{code}] "),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(message.clone()),
            ];
            if let Some(h) = help {
                spans.push(Span::styled(
                    format!(" (help: {h})"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            vec![Line::from(spans)]
        }
    }
}

fn labelled(label: &'static str, color: Color, text: &str) -> Vec<Line<'static>> {
    let label_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default();
    let mut out = vec![Line::from(vec![
        Span::styled(label, label_style),
        Span::raw(first.to_string()),
    ])];
    let indent = " ".repeat(label.len());
    out.extend(lines.map(|l| Line::from(format!("{indent}{l}"))));
    out
}

/// Hard-wrap styled lines to `width` display columns.
pub fn wrap_lines(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut out = Vec::with_capacity(lines.len());
    let mut buf = [0u8; 4];

    for line in lines {
        let mut row: Vec<Span<'static>> = Vec::new();
        let mut used = 0;
        for span in line.spans {
            let mut chunk = String::new();
            for ch in span.content.chars() {
                let w = Span::raw(&*ch.encode_utf8(&mut buf)).width();
                if used + w > width && used > 0 {
                    if !chunk.is_empty() {
                        row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                    }
                    out.push(Line::from(std::mem::take(&mut row)));
                    used = 0;
                }
                chunk.push(ch);
                used += w;
            }
            if !chunk.is_empty() {
                row.push(Span::styled(chunk, span.style));
            }
        }
        out.push(Line::from(row));
    }
    out
}

/// The whole transcript as display lines of at most `width` columns.
pub fn transcript_lines(messages: &[OracleMessage], width: usize) -> Vec<Line<'static>> {
    wrap_lines(messages.iter().flat_map(message_to_lines).collect(), width)
}

/// Main TUI layout rendering.
///
/// `scroll_offset` counts display lines scrolled back from the bottom of the
/// transcript; 0 keeps the latest line in view. Returns the offset clamped
/// to the transcript length.
pub fn render(
    frame: &mut Frame,
    status: &OracleStatus,
    messages: &[OracleMessage],
    input: &str,
    scroll_offset: usize,
) -> usize {
    let [header_area, messages_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let unset = || "-".to_string();
    let document_type = status.document_type.map(|t| t.to_string()).unwrap_or_else(unset);
    let provider = status.provider.clone().unwrap_or_else(unset);
    let model = status.model.clone().unwrap_or_else(unset);

    // Header.
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " doc-oracle ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" :: {provider} / {model} :: document: {document_type} ")),
    ]));
    frame.render_widget(header, header_area);

    // Transcript.
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(messages_area);
    let lines = transcript_lines(messages, inner.width as usize);
    let height = inner.height as usize;
    let max_offset = lines.len().saturating_sub(height);
    let scroll_offset = scroll_offset.min(max_offset);
    let top = max_offset - scroll_offset;
    let visible: Vec<Line> = lines.into_iter().skip(top).take(height).collect();
    frame.render_widget(Paragraph::new(visible).block(block), messages_area);

    // Input area.
    let input_widget = Paragraph::new(input)
        .block(Block::default().borders(Borders::ALL).title(" Talk to the Oracle "))
        .style(Style::default().fg(Color::White));
    frame.render_widget(input_widget, input_area);

    // Status bar.
    let state_color = match status.state {
        OracleState::Ready => Color::Green,
        OracleState::Uninitialized => Color::Yellow,
    };
    let status_line = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {} ", status.state), Style::default().fg(state_color)),
        Span::raw("| "),
        Span::styled(
            format!("history: {} ", status.history_len),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("| "),
        Span::styled("/help for commands ", Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(status_line, status_area);

    scroll_offset
}
