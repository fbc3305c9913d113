use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

use crate::grid::{all_positions, CellState, GridLayout, CELL_HEIGHT, CELL_WIDTH};
use crate::session::MAX_STAGE_MISTAKES;
use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;

const INSTRUCTION_TEXT: &str = "\
Welcome to the spatial working-memory experiment.

At the start of each round a board of squares appears, some of them highlighted in yellow. Memorize their positions. After 2 seconds every square turns blue, and your task is to click the squares that were yellow.

A correct click turns the square yellow again. A wrong click removes the square from the board; a second wrong click in the same round costs you one of your 3 chances and ends the round. After three lost chances the stage ends.

When you find all the yellow squares, the next round adds one more, and the board grows as the count goes up. Your clicks are timed, so be as fast as you can while staying accurate.

Your results are stored anonymously.

Press Space when you are ready to begin.";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);

        match self.screen {
            Screen::Instruction => {
                let text_area = margined(area, HORIZONTAL_MARGIN);
                Paragraph::new(INSTRUCTION_TEXT)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(text_area, buf);
            }
            Screen::StageStart => {
                let label = if self.stage.stage_number == 1 && self.config.stages > 1 {
                    format!("Starting stage {} (training)", self.stage.stage_number)
                } else {
                    format!("Starting stage {}", self.stage.stage_number)
                };
                centered_lines(
                    vec![
                        Line::from(Span::styled(label, bold_style)),
                        Line::from(""),
                        Line::from("Press Space to continue."),
                    ],
                    area,
                    buf,
                );
            }
            Screen::StageInfo { .. } => {
                centered_lines(
                    vec![
                        Line::from(format!("Stage: {}", self.stage.stage_number)),
                        Line::from(format!("Round: {}", self.round_number + 1)),
                        Line::from(format!(
                            "Chances: {}/{}",
                            self.stage.chances_left(),
                            MAX_STAGE_MISTAKES
                        )),
                    ],
                    area,
                    buf,
                );
            }
            Screen::Memorizing | Screen::Clicking => {
                render_board(self, area, buf);
            }
            Screen::Feedback { correct, .. } => {
                let (text, color) = if correct {
                    ("Correct!", Color::Green)
                } else {
                    ("Wrong!", Color::Red)
                };
                centered_lines(
                    vec![Line::from(Span::styled(
                        text,
                        Style::default().patch(bold_style).fg(color),
                    ))],
                    area,
                    buf,
                );
            }
            Screen::StageEnd => {
                centered_lines(
                    vec![
                        Line::from(Span::styled(
                            format!("Stage {} complete", self.stage.stage_number),
                            bold_style,
                        )),
                        Line::from(""),
                        Line::from("Press Space to continue."),
                    ],
                    area,
                    buf,
                );
            }
            Screen::Ending => {
                centered_lines(
                    vec![
                        Line::from(Span::styled("Your results have been saved.", bold_style)),
                        Line::from(""),
                        Line::from("Thank you for participating!"),
                    ],
                    area,
                    buf,
                );
            }
        }
    }
}

fn render_board(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(round) = app.round.as_ref() else {
        return;
    };
    let layout = GridLayout::centered(round.spec.grid_size, area.width, area.height);

    for pos in all_positions(round.spec.grid_size) {
        let color = match round.cell_state(pos) {
            CellState::Highlighted => Color::Yellow,
            CellState::Normal => Color::Blue,
            // a hidden cell is just background
            CellState::Hidden => continue,
        };
        let (x, y) = layout.cell_origin(pos);
        let cell = Rect::new(x, y, CELL_WIDTH, CELL_HEIGHT).intersection(area);
        buf.set_style(cell, Style::default().bg(color));
    }
}

fn margined(area: Rect, margin: u16) -> Rect {
    Rect {
        x: area.x + margin.min(area.width / 2),
        y: area.y,
        width: area.width.saturating_sub(margin * 2),
        height: area.height,
    }
}

fn centered_lines(lines: Vec<Line>, area: Rect, buf: &mut Buffer) {
    let height = (lines.len() as u16).min(area.height);
    let top = area.height.saturating_sub(height) / 2;
    let rect = Rect::new(area.x, area.y + top, area.width, height);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(rect, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{GridRound, RoundSpec};

    fn test_app(screen: Screen) -> App {
        let mut app = App::new(Config::default());
        app.screen = screen;
        app
    }

    fn rendered_text(app: &App, area: Rect) -> String {
        let mut buf = Buffer::empty(area);
        app.render(area, &mut buf);
        buf.content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn instruction_screen_mentions_the_space_key() {
        let app = test_app(Screen::Instruction);
        let text = rendered_text(&app, Rect::new(0, 0, 100, 40));
        assert!(text.contains("Space"));
    }

    #[test]
    fn stage_info_shows_round_and_chances() {
        let mut app = test_app(Screen::StageInfo {
            then: crate::InfoThen::BeginRound,
        });
        app.round_number = 2;
        let text = rendered_text(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("Stage: 1"));
        assert!(text.contains("Round: 3"));
        assert!(text.contains("Chances: 3/3"));
    }

    #[test]
    fn board_renders_highlighted_and_normal_cells() {
        let mut app = test_app(Screen::Memorizing);
        app.round = Some(GridRound::new(RoundSpec {
            grid_size: 3,
            selected: vec![(0, 0)],
        }));

        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        (&app).render(area, &mut buf);

        let layout = GridLayout::centered(3, 80, 24);
        let (hx, hy) = layout.cell_origin((0, 0));
        let (nx, ny) = layout.cell_origin((1, 1));
        assert_eq!(buf.cell((hx, hy)).unwrap().style().bg, Some(Color::Yellow));
        assert_eq!(buf.cell((nx, ny)).unwrap().style().bg, Some(Color::Blue));
    }

    #[test]
    fn feedback_screen_shows_the_verdict() {
        let app = test_app(Screen::Feedback {
            correct: true,
            then: crate::AfterFeedback::PostRoundInfo,
        });
        let text = rendered_text(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("Correct!"));
    }

    #[test]
    fn every_screen_renders_without_panicking() {
        let screens = [
            Screen::Instruction,
            Screen::StageStart,
            Screen::Memorizing,
            Screen::Clicking,
            Screen::StageEnd,
            Screen::Ending,
        ];
        for screen in screens {
            let app = test_app(screen);
            // tiny and large areas both have to work
            rendered_text(&app, Rect::new(0, 0, 10, 4));
            rendered_text(&app, Rect::new(0, 0, 200, 60));
        }
    }
}
