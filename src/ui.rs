use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;
use valence::{
    loader::{LoadState, WordSource},
    phase::{Phase, SubmissionStatus},
    submitter::ResultsSink,
    timer::Clock,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const MIN_INPUT_WIDTH: u16 = 40;

pub fn draw<S, R, C>(app: &App<S, R, C>, f: &mut Frame)
where
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
{
    let area = f.area();
    let ctl = app.session.controller();

    match ctl.phase() {
        Phase::AwaitingIdentifier => draw_identifier(app, f, area),
        Phase::Loading => {
            let status = match ctl.load_state() {
                LoadState::Retrying(n) => {
                    format!("Could not reach the word list, retrying ({n})…")
                }
                _ => "Loading word list…".to_string(),
            };
            draw_message(
                f,
                area,
                vec![
                    Line::styled(status, dim_bold()),
                    Line::from(""),
                    Line::styled(
                        match ctl.participant() {
                            Some(id) => format!("{id} @ {}", app.base_url),
                            None => app.base_url.clone(),
                        },
                        dim(),
                    ),
                ],
            );
        }
        Phase::LoadError => {
            let reason = ctl
                .load_error()
                .map(|e| e.to_string())
                .unwrap_or_default();
            draw_message(
                f,
                area,
                vec![
                    Line::styled("The word list could not be loaded.", error_style()),
                    Line::styled(reason, dim()),
                    Line::from(""),
                    press_space("to try again"),
                ],
            );
        }
        Phase::Intro => draw_message(
            f,
            area,
            vec![
                Line::styled("Word Classification", bold()),
                Line::from(""),
                press_space("to begin"),
            ],
        ),
        Phase::Instructions => draw_message(
            f,
            area,
            vec![
                Line::from("Dear participant,"),
                Line::from(""),
                Line::from("This study measures how quickly you classify words."),
                Line::from("Words will appear on the screen one at a time."),
                Line::from(""),
                Line::from(vec![
                    Span::raw("If the word carries a "),
                    Span::styled("positive", bold().fg(Color::Green)),
                    Span::raw(" emotion, press the "),
                    Span::styled("Right arrow (→)", underlined()),
                ]),
                Line::from(vec![
                    Span::raw("If it carries a "),
                    Span::styled("negative", bold().fg(Color::Red)),
                    Span::raw(" emotion, press the "),
                    Span::styled("Left arrow (←)", underlined()),
                ]),
                Line::from("Answer as quickly as you can."),
                Line::from(""),
                press_space("when you are ready to start the practice round"),
            ],
        ),
        Phase::Practice | Phase::Scored => match ctl.current_stimulus() {
            Some(stimulus) => draw_stimulus(f, area, &stimulus.word, ctl.progress()),
            None => draw_submission(app, f, area),
        },
        Phase::PracticeComplete => draw_message(
            f,
            area,
            vec![
                Line::styled("The practice round is complete.", bold()),
                Line::from(""),
                press_space("to start the test"),
            ],
        ),
        Phase::Completed => draw_message(
            f,
            area,
            vec![
                Line::styled("Test complete!", bold()),
                Line::from("Thank you for participating."),
                Line::from(""),
                Line::styled("(q) quit", dim()),
            ],
        ),
    }
}

fn draw_identifier<S, R, C>(app: &App<S, R, C>, f: &mut Frame, area: Rect)
where
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
{
    let input_width = (app.identifier_input.width() as u16 + 4)
        .max(MIN_INPUT_WIDTH)
        .min(area.width.saturating_sub(HORIZONTAL_MARGIN * 2));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Line::styled("Please enter your email address", bold()))
            .alignment(Alignment::Center),
        chunks[1],
    );

    let field = centered(chunks[2], input_width);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(app.identifier_input.clone()),
            Span::styled("▏", dim()),
        ]))
        .block(Block::default().borders(Borders::ALL).title("email")),
        field,
    );

    let footer = match app.session.notice() {
        Some(notice) => Line::styled(notice.to_string(), error_style()),
        None => Line::styled("(enter) start test  (esc) quit", dim()),
    };
    f.render_widget(
        Paragraph::new(footer).alignment(Alignment::Center),
        chunks[3],
    );
}

fn draw_stimulus(f: &mut Frame, area: Rect, word: &str, progress: Option<(usize, usize)>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(word.to_string(), bold()))
            .alignment(Alignment::Center),
        chunks[1],
    );

    if let Some((shown, total)) = progress {
        f.render_widget(
            Paragraph::new(Span::styled(format!("{shown}/{total}"), dim()))
                .alignment(Alignment::Right),
            chunks[3],
        );
    }
}

fn draw_submission<S, R, C>(app: &App<S, R, C>, f: &mut Frame, area: Rect)
where
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
{
    let lines = match app.session.controller().submission() {
        SubmissionStatus::Failed(_) => vec![
            Line::styled(
                app.session
                    .notice()
                    .unwrap_or("Error saving results.")
                    .to_string(),
                error_style(),
            ),
            Line::from(""),
            Line::styled("(r) retry  (esc) quit", dim()),
        ],
        _ => vec![Line::styled("Saving results…", dim_bold())],
    };
    draw_message(f, area, lines);
}

fn draw_message(f: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    let height = lines.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Min(height),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Text::from(lines))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

fn press_space(action: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("Press "),
        Span::styled("Space", underlined()),
        Span::raw(format!(" {action}.")),
    ])
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn underlined() -> Style {
    Style::default().add_modifier(Modifier::UNDERLINED)
}

fn error_style() -> Style {
    bold().fg(Color::Red)
}
