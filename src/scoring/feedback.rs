/// Component scores (0-100) below this earn a specific tip.
const WEAK_COMPONENT: f64 = 60.0;

/// Performance message for an overall score and its components, all 0-100.
pub fn feedback(overall: f64, spatial: f64, timing: f64, rhythm: f64) -> String {
    if overall >= 90.0 {
        return "Outstanding performance! Perfect execution!".to_string();
    }
    if overall >= 80.0 {
        return "Excellent dancing! Great job!".to_string();
    }
    if overall >= 70.0 {
        return "Good performance! Keep practicing!".to_string();
    }
    if overall >= 60.0 {
        return "Nice effort! Focus on improvement areas below.".to_string();
    }

    let tips: Vec<&str> = [
        (spatial, "improve pose accuracy"),
        (timing, "work on timing consistency"),
        (rhythm, "focus on rhythm and flow"),
    ]
    .into_iter()
    .filter(|(score, _)| *score < WEAK_COMPONENT)
    .map(|(_, tip)| tip)
    .collect();

    if tips.is_empty() {
        "Keep practicing to improve your performance!".to_string()
    } else {
        format!("Try to {}.", tips.join(" and "))
    }
}
