use std::mem::take;

/// One comment token buffered between terminals.
#[derive(Debug, Clone)]
pub(super) struct CommentToken {
    pub text: String,
    pub start_line: i32,
    pub end_line: i32,
    pub block: bool,
}

/// Buffers comment tokens and attributes them to the surrounding
/// terminals.
///
/// Comments collected since the previous terminal either become the
/// trailing comment group of that terminal or the leading comments of the
/// next one, decided by line-gap rules when the next terminal is seen:
///
/// - A group is considered trailing only when the next terminal starts on
///   a later line than the previous one ended, and the first comment
///   starts within one line of the previous terminal.
/// - The first group is a single comment when it starts on the previous
///   terminal's line or is a block comment; otherwise adjacent line
///   comments merge until a blank line or a style switch.
/// - The group then moves to the previous terminal if the next terminal is
///   a punctuation rune other than '.', further comments follow the group,
///   the group shares the previous terminal's line while the next terminal
///   is below it, or a blank line separates the group from the next
///   terminal.
#[derive(Debug, Default)]
pub(super) struct CommentQueue {
    pending: Vec<CommentToken>,
    leading: Vec<CommentToken>,
    leading_line: i32,
    trailing: Option<String>,
    prev_end_line: Option<i32>,
}

impl CommentQueue {
    pub fn new() -> Self {
        CommentQueue::default()
    }

    pub fn push(&mut self, comment: CommentToken) {
        self.pending.push(comment);
    }

    /// Splits the buffered comments between the previous terminal and the
    /// terminal about to be returned, which starts on `next_start_line`.
    pub fn attribute(&mut self, next_start_line: i32, detaching: bool) {
        self.trailing = None;
        let mut comments = take(&mut self.pending);
        self.leading_line = next_start_line;

        let prev_end = match self.prev_end_line {
            Some(line) if !comments.is_empty() => line,
            _ => {
                self.leading = comments;
                return;
            }
        };

        let c0_start = comments[0].start_line;
        let mut split = 0;
        if next_start_line > prev_end && c0_start - prev_end <= 1 {
            // A same-line or block first comment is a group by itself,
            // even when more line comments directly follow it.
            let k = if c0_start == prev_end || comments[0].block {
                1
            } else {
                let mut k = comments.len();
                let mut prev_line = comments[0].end_line;
                for (i, comment) in comments.iter().enumerate().skip(1) {
                    if comment.block || comment.start_line > prev_line + 1 {
                        k = i;
                        break;
                    }
                    prev_line = comment.end_line;
                }
                k
            };

            let group_end = comments[k - 1].end_line;
            if detaching
                || k < comments.len()
                || (c0_start == prev_end && next_start_line > group_end)
                || next_start_line - group_end > 1
            {
                split = k;
            }
        }

        if split > 0 {
            self.trailing = Some(render_group(&comments[..split]));
            comments.drain(..split);
        }
        self.leading = comments;
    }

    /// Records that the current terminal was consumed. Leading comments
    /// not claimed by a declaration are dropped here.
    pub fn token_consumed(&mut self, end_line: i32) {
        self.prev_end_line = Some(end_line);
        self.leading.clear();
    }

    /// Takes the comments attributed to the current terminal, split into
    /// detached groups and the group directly above the terminal.
    pub fn take_leading(&mut self) -> (Vec<String>, Option<String>) {
        let comments = take(&mut self.leading);
        if comments.is_empty() {
            return (Vec::new(), None);
        }

        let mut groups: Vec<Vec<CommentToken>> = Vec::new();
        for comment in comments {
            match groups.last_mut() {
                Some(group)
                    if !group.last().unwrap().block
                        && !comment.block
                        && comment.start_line <= group.last().unwrap().end_line + 1 =>
                {
                    group.push(comment)
                }
                _ => groups.push(vec![comment]),
            }
        }

        let attached = match groups.last() {
            Some(last) => self.leading_line - last.last().unwrap().end_line <= 1,
            None => false,
        };
        let leading = if attached {
            Some(render_group(&groups.pop().unwrap()))
        } else {
            None
        };

        let detached = groups.iter().map(|group| render_group(group)).collect();
        (detached, leading)
    }

    /// Takes the group attributed as trailing comments of the previous
    /// terminal, if any.
    pub fn take_trailing(&mut self) -> Option<String> {
        take(&mut self.trailing)
    }
}

fn render_group(group: &[CommentToken]) -> String {
    if group.len() == 1 && group[0].block {
        group[0].text.clone()
    } else {
        let mut text = String::new();
        for comment in group {
            text.push_str(&comment.text);
            text.push('\n');
        }
        text
    }
}
