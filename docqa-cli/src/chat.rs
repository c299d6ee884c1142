//! The interactive question loop.

use std::io::{BufRead, Write};

use anyhow::Context;
use docqa_rag::{Answer, RagPipeline};
use tracing::debug;

const QUESTION_PROMPT: &str = "Chat and ask the question related to the document: ";
const QUIT_PROMPT: &str = "Press 'q' to quit or Enter to ask another question: ";
const PREVIEW_CHARS: usize = 200;

/// Print `prompt`, then read one line with its line ending removed.
///
/// Returns `Ok(None)` at end of input.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> std::io::Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}

/// Ask questions about `collection` until the user quits.
///
/// Each round prompts for a question, answers it through
/// [`RagPipeline::ask`], prints the retrieval diagnostics and the answer,
/// then asks whether to quit. A case-insensitive `q` or the end of input
/// stops the loop; blank questions are asked again. Returns the number of
/// questions answered.
pub async fn run_chat<R: BufRead, W: Write>(
    pipeline: &RagPipeline,
    collection: &str,
    mut input: R,
    mut output: W,
) -> anyhow::Result<usize> {
    let mut answered = 0;

    loop {
        let Some(question) = prompt_line(&mut input, &mut output, QUESTION_PROMPT)? else {
            break;
        };
        let question = question.trim();
        if question.is_empty() {
            continue;
        }

        debug!(collection, question, "asking");
        let answer = pipeline
            .ask(collection, question)
            .await
            .with_context(|| format!("failed to answer question from collection '{collection}'"))?;
        print_answer(&mut output, &answer)?;
        answered += 1;

        match prompt_line(&mut input, &mut output, QUIT_PROMPT)? {
            Some(reply) if !reply.trim().eq_ignore_ascii_case("q") => {}
            _ => break,
        }
    }

    Ok(answered)
}

fn print_answer<W: Write>(output: &mut W, answer: &Answer) -> std::io::Result<()> {
    writeln!(output, "Retrieved {} chunk(s)", answer.results.len())?;
    match answer.results.first() {
        Some(first) => {
            let preview: String = first.chunk.text.chars().take(PREVIEW_CHARS).collect();
            writeln!(output, "Top match (score {:.3}): {preview}", first.score)?;
        }
        None => writeln!(output, "(no results)")?,
    }
    writeln!(output)?;
    writeln!(output, "{}", answer.text)?;
    writeln!(output, "{}", "-".repeat(60))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn prompt_line_strips_line_endings() {
        let mut input = Cursor::new("hello\r\nworld");
        let mut output = Vec::new();

        assert_eq!(prompt_line(&mut input, &mut output, "> ").unwrap().as_deref(), Some("hello"));
        assert_eq!(prompt_line(&mut input, &mut output, "> ").unwrap().as_deref(), Some("world"));
        assert_eq!(prompt_line(&mut input, &mut output, "> ").unwrap(), None);
        assert_eq!(String::from_utf8(output).unwrap(), "> > > ");
    }
}
