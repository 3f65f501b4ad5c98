//! Built-in prompt templates

use crate::render::QualityPreset;

pub const SYSTEM: &str = r#"You are an expert Manim Community Edition (v0.18+) animator and Python developer.
Write one self-contained Python file that renders the requested mathematical animation.

## Output rules
- Reply with valid Python code only. No markdown fences and no prose around the code.
- Define exactly one class deriving from Scene (or ThreeDScene for 3D work).
- The class must be named {{scene}}.
- Finish construct() with at least one self.wait(1).
- Import from `manim` only, never from `manimlib`.

## Manim conventions
- MathTex for mathematical expressions, Text for plain labels
- Animate through self.play(); use self.add() only for static objects
- VGroup to group related mobjects
- Transform or ReplacementTransform for morphing
- Create, Write, FadeIn, FadeOut, GrowFromCenter for entrances and exits
- Axes or NumberPlane for coordinate systems
- always_redraw() for objects that track other objects

## Quality target: {{quality}}
{{quality_hint}}

## Skeleton
from manim import *

class {{scene}}(Scene):
    def construct(self):
        ...
        self.wait(1)
"#;

pub const INITIAL: &str = r#"Create a Manim animation that: {{description}}

Reply with Python code only, defining a class named {{scene}}."#;

pub const FOLLOWUP: &str = r#"The user wants to change the existing Manim animation. This is the current working code:

## Current code
```python
{{code}}
```

## Requested change
{{change}}

## Instructions
- Apply the requested change to the existing code
- Reply with the complete updated Python code only
- Keep the class named {{scene}}
- Keep existing behaviour unless the user asks to remove it
- Import from `manim`, not `manimlib`
"#;

pub const CORRECTION: &str = r#"The Manim code below failed to render ({{kind}}). Fix it.

## Failing code
```python
{{code}}
```

## Renderer output
```
{{excerpt}}
```

## What to fix
{{hint}}

## Instructions
- Find the root cause in the renderer output above
- Reply with the corrected Python code only
- Keep the class named {{scene}}
- Import from `manim`, not `manimlib`
- Use the Manim v0.18+ API for any attribute or method the error mentions
{{#if request}}

The animation must still satisfy the original request: {{request}}
{{/if}}"#;

/// Complexity guidance matching the render preset
pub fn quality_hint(quality: QualityPreset) -> &'static str {
    match quality {
        QualityPreset::Low => "Keep it simple and quick: few objects, short durations, under 10 seconds total.",
        QualityPreset::Medium => "Standard complexity: a few key objects with smooth transitions, 15 to 30 seconds.",
        QualityPreset::High => "Rich detail: several stages, careful camera work and polished transitions, 30 to 60 seconds.",
        QualityPreset::Ultra => "Publication grade: precise typography and a complex multi-stage animation.",
    }
}
