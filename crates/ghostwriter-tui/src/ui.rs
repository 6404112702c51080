use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use ghostwriter_core::RoundState;
use crate::app::{cover_details, App, InputField, InputMode, TextInput, TranscriptEntry};

/// Render `**bold**` runs in a lyric line; an unclosed `**` stays literal
fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    let closed = parts.len() % 2 == 1;
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let spans: Vec<Span<'static>> = parts
        .iter()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| {
            let inside = i % 2 == 1;
            if inside && (closed || i + 1 < parts.len()) {
                Span::styled(part.to_string(), bold)
            } else if inside {
                Span::raw(format!("**{}", part))
            } else {
                Span::raw(part.to_string())
            }
        })
        .collect();

    Line::from(spans)
}

fn role_line(label: &'static str, color: Color) -> Line<'static> {
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, subtitle_area, chat_area, artist_area, theme_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);

    let subtitle = Paragraph::new(Span::styled(
        " Generate custom song lyrics based on your favorite artist and theme",
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(subtitle, subtitle_area);

    render_transcript(app, frame, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    render_input(
        frame,
        artist_area,
        " Musical artist ",
        &app.artist,
        app.focus == InputField::Artist,
        editing,
    );
    render_input(
        frame,
        theme_area,
        " Theme or description for the song ",
        &app.theme,
        app.focus == InputField::Theme,
        editing,
    );

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Ghost Writer AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(app.model.clone(), Style::default().fg(Color::Magenta)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Lyrics ");

    let busy = app.round_state.is_busy();
    let text = if app.transcript.is_empty() && !busy {
        Text::from(Span::styled(
            "Enter an artist and a theme, then press Enter to write a song...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in &app.transcript {
            match entry {
                TranscriptEntry::User { artist, theme } => {
                    lines.push(role_line("You:", Color::Cyan));
                    lines.push(Line::from(vec![
                        Span::raw("Artist: ").bold(),
                        Span::raw(artist.clone()),
                    ]));
                    lines.push(Line::from(vec![
                        Span::raw("Theme: ").bold(),
                        Span::raw(theme.clone()),
                    ]));
                }
                TranscriptEntry::Assistant(content) => {
                    lines.push(role_line("AI:", Color::Yellow));
                    lines.extend(content.lines().map(parse_markdown_line));
                }
                TranscriptEntry::Cover { caption, path, mime_type, size } => {
                    lines.push(role_line("Cover:", Color::Magenta));
                    lines.push(Line::from(Span::styled(
                        caption.clone(),
                        Style::default().add_modifier(Modifier::ITALIC),
                    )));
                    lines.push(Line::from(Span::styled(
                        cover_details(path, mime_type, *size),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                TranscriptEntry::Error(message) => {
                    lines.push(role_line("Error:", Color::Red));
                    let red = Style::default().fg(Color::Red);
                    lines.extend(
                        message
                            .lines()
                            .map(|l| Line::from(Span::styled(l.to_string(), red))),
                    );
                }
            }
            lines.push(Line::default());
        }

        if busy {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            let pending = |label: &str| {
                Line::from(Span::styled(
                    format!("{}{}", label, dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ))
            };

            match (&app.streaming, app.round_state) {
                (_, RoundState::AwaitingCover | RoundState::CoverReady) => {
                    lines.push(role_line("Cover:", Color::Magenta));
                    lines.push(pending("Painting the album cover"));
                }
                (Some(partial), _) => {
                    lines.push(role_line("AI:", Color::Yellow));
                    lines.extend(partial.lines().map(parse_markdown_line));
                }
                (None, _) => {
                    lines.push(role_line("AI:", Color::Yellow));
                    lines.push(pending("Writing"));
                }
            }
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(
    frame: &mut Frame,
    area: Rect,
    title: &'static str,
    input: &TextInput,
    focused: bool,
    editing: bool,
) {
    let border_color = match (focused, editing) {
        (true, true) => Color::Yellow,
        (true, false) => Color::Cyan,
        _ => Color::DarkGray,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Keep the cursor visible with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && input.cursor >= inner_width {
        input.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .value
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if focused && editing {
        let cursor_x = (input.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => " i edit  s submit  Tab field  j/k scroll  g/G top/bottom  q quit ",
        InputMode::Editing => " Enter submit  Tab field  Esc done ",
    };

    let state_style = match app.round_state {
        RoundState::Failed => Style::default().fg(Color::Red),
        state if state.is_busy() => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::DarkGray),
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style.bold()),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
        Span::styled(format!("[{}]", app.round_state.description()), state_style),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}
