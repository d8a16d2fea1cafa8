//! Generation instructions for the model.
//!
//! The instruction is a fixed template plus one block of format rules looked up
//! per topic. Rendering is pure: same inputs, same text.

use crate::config::Prompts;
use crate::domain::{Difficulty, ParseError, Topic};
use crate::util::fill_template;

pub const DEFAULT_QUESTION_TEMPLATE: &str = r#"
You are an expert author of non-verbal reasoning questions for 11 Plus exams.
Create one new, original question for:
- Topic: "{topic}"
- Difficulty: "{difficulty}"

Rules:
1. Match complexity to the difficulty.
   * Easy: one obvious rule (number of sides, type of shape).
   * Medium: one subtle rule, or two simple rules combined (e.g. rotation plus a shape change).
   * Hard: two or more rules combined, or a multi-step logical relationship.
   Complexity must come from clear logic, never from random or ambiguous decoration.
2. All 5 options (A, B, C, D, E) must have visually distinct SVG diagrams. Never repeat an SVG.
3. Topic format for "{topic}":
{topic_rules}
4. The explanation must account for every element and rule in the diagrams.

Output JSON with:
1. "question": a clear prompt worded for the topic.
2. "options": exactly 5 options labelled A, B, C, D, E.
3. For each option an "svg": a self-contained SVG with viewBox="0 0 100 100" using <rect>, <circle>,
   <line>, <path> or <polygon>, stroke="white", fill="white" or fill="none", stroke-width of at least 2.
4. "answer": the label of the correct option.
5. "explanation": a concise but complete account of the logic.

Follow the provided JSON schema exactly.
"#;

/// Question-format rules for a topic.
pub fn topic_rules(topic: Topic) -> &'static str {
  match topic {
    Topic::OddOneOut => {
      "Four options share one clear rule and exactly one option breaks it. \
       Ask \"Which of the following is the odd one out?\" or \"Which figure does not belong?\""
    }
    Topic::SeriesAndSequences => {
      "Build a sequence of shapes following a clear pattern (progressive rotation, growing element \
       count, alternating features). One option is the correct next or missing element; the others \
       are plausible wrong continuations. Ask \"What comes next in the sequence?\""
    }
    Topic::Analogies => {
      "Show a transformation from shape A to shape B (rotation, added elements, fill change), then \
       shape C. The correct option applies the same transformation to C. Ask \"A is to B as C is to ?\""
    }
    Topic::Reflections => {
      "Show one shape; one option is its correct horizontal or vertical mirror image and the other \
       four are wrong reflections or rotations. Ask \"Which is the mirror image of the shape?\""
    }
    Topic::Rotations => {
      "Show one shape; one option is that shape rotated by a stated angle (90, 180 or 270 degrees). \
       Ask \"Which figure shows the shape rotated 90 degrees clockwise?\" or similar."
    }
    Topic::CodesAndGrids => {
      "Define a code or grid where shapes map to symbols or positions, then ask which shape matches \
       a given code. Ask \"Which shape matches code XYZ?\""
    }
    Topic::ShapeRelationships3d => {
      "Show a net or unfolded shape and ask which 3D shape it folds into, or the reverse. \
       Ask \"Which cube can be made from this net?\""
    }
    Topic::SpatialReasoning => {
      "Show shapes moving, flipping, swapping or transforming over several steps and ask for the \
       final result. Ask \"After these transformations, what is the result?\""
    }
  }
}

/// Render the default instruction for a topic and difficulty.
pub fn build_prompt(topic: Topic, difficulty: Difficulty) -> String {
  build_prompt_with(&Prompts::default(), topic, difficulty)
}

/// Render a (possibly overridden) template for a topic and difficulty.
pub fn build_prompt_with(prompts: &Prompts, topic: Topic, difficulty: Difficulty) -> String {
  let rules = topic_rules(topic);
  let body = fill_template(
    &prompts.question_template,
    &[("topic", topic.name()), ("difficulty", difficulty.name()), ("topic_rules", rules)],
  );
  // Overrides may drop placeholders; the model still needs both names.
  if body.contains(topic.name()) && body.contains(difficulty.name()) {
    body
  } else {
    format!("Topic: \"{}\"\nDifficulty: \"{}\"\n{}", topic.name(), difficulty.name(), body)
  }
}

/// String entry point: unknown names fail before any text is produced.
pub fn build_prompt_for(topic: &str, difficulty: &str) -> Result<String, ParseError> {
  Ok(build_prompt(topic.parse()?, difficulty.parse()?))
}
