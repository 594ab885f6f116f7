use crate::models::{AuthView, Habit, MAX_YEAR, MIN_YEAR, MonthView, Scope, Unit};
use crate::stats::{STREAK_THRESHOLD, score_for};
use crate::store::{CLEAR_MONTH_PROMPT, REMOVE_HABIT_PROMPT};
use std::fmt::Write;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

pub fn render_index(view: &MonthView) -> String {
    let dataset = &view.dataset;
    let stats = &view.stats;

    let mut month_options = String::new();
    for (index, name) in MONTH_NAMES.iter().enumerate() {
        let value = index as u32 + 1;
        let selected = if value == dataset.month { " selected" } else { "" };
        let _ = write!(month_options, r#"<option value="{value}"{selected}>{name}</option>"#);
    }

    let mut day_header = String::new();
    for day in 1..=stats.days_in_month {
        let class = if stats.today == Some(day) { " class=\"today\"" } else { "" };
        let _ = write!(day_header, "<th{class}>{day}</th>");
    }

    let mut rows = String::new();
    for (habit, completion) in dataset.habits.iter().zip(&stats.habits) {
        let target = match habit.unit {
            Unit::Check => String::new(),
            unit => format!("{} {}", format_number(habit.target), unit.label()),
        };
        let _ = write!(
            rows,
            r#"<tr><th class="habit"><span>{title}</span><small>{target}</small>{editor}</th>"#,
            title = escape_html(&habit.title),
            target = escape_html(&target),
            editor = habit_editor(habit),
        );
        for day in 1..=stats.days_in_month {
            let value = dataset.value(&habit.id, day);
            let score = score_for(habit, value);
            let class = if score >= 1.0 {
                "done"
            } else if score > 0.0 {
                "partial"
            } else {
                "empty"
            };
            let label = match (habit.unit, value) {
                (_, None) => String::new(),
                (Unit::Check, Some(v)) if v != 0.0 => "✓".to_string(),
                (Unit::Check, Some(_)) => String::new(),
                (_, Some(v)) => format_number(v),
            };
            let _ = write!(
                rows,
                r#"<td><form method="post" action="/cell/cycle"><input type="hidden" name="habit_id" value="{id}"><input type="hidden" name="day" value="{day}"><button class="{class}">{label}</button></form></td>"#,
                id = escape_html(&habit.id),
            );
        }
        let _ = write!(
            rows,
            r#"<td class="pct{hit}">{pct}%</td></tr>"#,
            hit = if f64::from(completion.completion_pct) >= STREAK_THRESHOLD * 100.0 {
                " hit"
            } else {
                ""
            },
            pct = completion.completion_pct,
        );
    }


    INDEX_HTML
        .replace("{{TITLE}}", &escape_html(&dataset.title))
        .replace("{{MONTH_OPTIONS}}", &month_options)
        .replace("{{YEAR}}", &dataset.year.to_string())
        .replace("{{MIN_YEAR}}", &MIN_YEAR.to_string())
        .replace("{{MAX_YEAR}}", &MAX_YEAR.to_string())
        .replace("{{CLEAR_PROMPT}}", CLEAR_MONTH_PROMPT)
        .replace("{{UNIT_OPTIONS}}", &unit_options(Unit::Check))
        .replace("{{DAYS}}", &stats.days_in_month.to_string())
        .replace("{{PROGRESS}}", &stats.month_progress_pct.to_string())
        .replace("{{AVERAGE}}", &stats.average_daily_score_pct.to_string())
        .replace("{{STREAK}}", &stats.longest_streak.to_string())
        .replace("{{DAY_HEADER}}", &day_header)
        .replace("{{ROWS}}", &rows)
        .replace("{{AUTH}}", &auth_panel(&view.auth))
        .replace(
            "{{STATUS}}",
            &escape_html(view.sync_status.as_deref().unwrap_or("")),
        )
}

fn unit_options(selected: Unit) -> String {
    let mut options = String::new();
    for unit in Unit::ALL {
        let marker = if unit == selected { " selected" } else { "" };
        let _ = write!(
            options,
            r#"<option value="{key}"{marker}>{label}</option>"#,
            key = unit.key(),
            label = unit.label(),
        );
    }
    options
}

fn habit_editor(habit: &Habit) -> String {
    let id = escape_html(&habit.id);
    format!(
        r#"<details><summary>Edit</summary><form method="post" action="/habits/{id}"><input name="title" value="{title}" required /><select name="unit">{units}</select><input type="number" name="target" min="0" step="any" value="{target}" required /><button type="submit">Save</button></form><form method="post" action="/habits/{id}/remove" onsubmit="return confirm('{prompt}');"><input type="hidden" name="confirmed" value="true" /><button type="submit">Remove</button></form></details>"#,
        title = escape_html(&habit.title),
        units = unit_options(habit.unit),
        target = habit.target,
        prompt = REMOVE_HABIT_PROMPT,
    )
}

fn auth_panel(auth: &AuthView) -> String {
    match (auth.scope, auth.sign_in_available) {
        (Scope::User, _) => format!(
            r#"<span class="status">Cloud: {email}</span><form method="post" action="/auth/sign-out"><button type="submit">Sign out</button></form>"#,
            email = escape_html(auth.email.as_deref().unwrap_or("account")),
        ),
        (Scope::Device, true) => r#"<span class="status">Cloud: this device</span><form method="post" action="/auth/link"><input type="email" name="email" placeholder="you@example.com" required /><button type="submit">Email sign-in link</button></form>"#.to_string(),
        (Scope::Device, false) => {
            r#"<span class="status">Cloud: this device (sign-in not configured)</span>"#.to_string()
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #0b0b0c;
      --panel: #161618;
      --line: #2a2a2e;
      --ink: #ececec;
      --muted: #8d8d93;
      --accent: #3b82f6;
      --done: #16a34a;
      --partial: #ca8a04;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Trebuchet MS", sans-serif;
    }

    header {
      position: sticky;
      top: 0;
      z-index: 2;
      backdrop-filter: blur(10px);
      background: rgba(11, 11, 12, 0.85);
      border-bottom: 1px solid var(--line);
      padding: 16px 20px;
      display: grid;
      gap: 12px;
    }

    h1 {
      margin: 0;
      font-size: 1.6rem;
    }

    .controls {
      display: flex;
      flex-wrap: wrap;
      gap: 8px;
      align-items: center;
    }

    .controls form {
      display: inline-flex;
      gap: 6px;
    }

    select,
    input,
    button {
      background: var(--panel);
      color: var(--ink);
      border: 1px solid var(--line);
      border-radius: 10px;
      padding: 6px 10px;
      font: inherit;
    }

    button.primary {
      background: var(--accent);
      border-color: var(--accent);
    }

    .stats {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
      gap: 8px;
    }

    .stat {
      background: var(--panel);
      border: 1px solid var(--line);
      border-radius: 14px;
      padding: 10px 14px;
    }

    .stat .label {
      color: var(--muted);
      font-size: 0.8rem;
    }

    .stat .value {
      font-size: 1.4rem;
      font-weight: 600;
    }

    .status {
      color: var(--muted);
      font-size: 0.85rem;
    }

    .grid {
      overflow-x: auto;
      padding: 16px 20px 40px;
    }

    table {
      border-collapse: collapse;
    }

    th,
    td {
      border: 1px solid var(--line);
      padding: 2px;
      text-align: center;
      font-size: 0.8rem;
    }

    th.today {
      color: var(--accent);
    }

    th.habit {
      position: sticky;
      left: 0;
      background: var(--bg);
      min-width: 220px;
      text-align: left;
      padding: 4px 8px;
    }

    th.habit small {
      display: block;
      color: var(--muted);
    }

    td form button {
      width: 38px;
      height: 30px;
      padding: 0;
    }

    td form button.done {
      background: var(--done);
    }

    td form button.partial {
      background: var(--partial);
    }

    td.pct.hit {
      color: var(--done);
    }

    th.habit details form {
      display: flex;
      gap: 4px;
      margin-top: 4px;
    }

    th.habit details input[name="target"] {
      width: 80px;
    }

    .add-habit,
    .title {
      display: flex;
      gap: 6px;
      margin-top: 12px;
    }

    .import input {
      display: none;
    }
  </style>
</head>
<body>
  <header>
    <h1>{{TITLE}}</h1>
    <form class="title" method="post" action="/title">
      <input name="title" value="{{TITLE}}" aria-label="Title" />
      <button type="submit">Rename</button>
    </form>
    <div class="controls">
      <form method="post" action="/month/navigate">
        <select name="month">{{MONTH_OPTIONS}}</select>
        <input type="number" name="year" min="{{MIN_YEAR}}" max="{{MAX_YEAR}}" value="{{YEAR}}" />
        <button type="submit">Go</button>
      </form>
      <form method="post" action="/month/clear" onsubmit="return confirm('{{CLEAR_PROMPT}}');">
        <input type="hidden" name="confirmed" value="true" />
        <button type="submit">Clear month</button>
      </form>
      <a href="/api/export"><button type="button">Export</button></a>
      <label class="import">Import <input id="import-file" type="file" accept="application/json,.json" /></label>
      <form method="post" action="/cloud/load"><button type="submit">Load from cloud</button></form>
      <form method="post" action="/cloud/save"><button class="primary" type="submit">Save to cloud</button></form>
      {{AUTH}}
    </div>
    <div class="stats">
      <div class="stat"><div class="label">Days</div><div class="value">{{DAYS}}</div></div>
      <div class="stat"><div class="label">Month progress</div><div class="value">{{PROGRESS}}%</div></div>
      <div class="stat"><div class="label">Average daily score</div><div class="value">{{AVERAGE}}%</div></div>
      <div class="stat"><div class="label">Longest streak (80%+)</div><div class="value">{{STREAK}}</div></div>
    </div>
    <div class="status">{{STATUS}}</div>
  </header>
  <main class="grid">
    <table>
      <thead>
        <tr><th class="habit">Habit</th>{{DAY_HEADER}}<th>Done</th></tr>
      </thead>
      <tbody>
        {{ROWS}}
      </tbody>
    </table>
    <form class="add-habit" method="post" action="/habits">
      <input name="title" placeholder="New habit" required />
      <select name="unit">{{UNIT_OPTIONS}}</select>
      <input type="number" name="target" min="0" step="any" value="1" required />
      <button type="submit">Add habit</button>
    </form>
  </main>
  <script>
    const fragment = new URLSearchParams(window.location.hash.slice(1));
    const accessToken = fragment.get('access_token');
    if (accessToken) {
      history.replaceState(null, '', window.location.pathname);
      fetch('/api/auth/session', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ access_token: accessToken }),
      }).then(() => window.location.reload());
    }

    document.getElementById('import-file').addEventListener('change', async (event) => {
      const file = event.target.files[0];
      if (!file) return;
      const response = await fetch('/api/import', { method: 'POST', body: await file.text() });
      if (!response.ok) {
        alert(await response.text());
      }
      window.location.reload();
    });

    document.querySelectorAll('td form').forEach((form) => {
      form.addEventListener('contextmenu', (event) => {
        event.preventDefault();
        form.action = '/cell/clear';
        form.submit();
      });
    });
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonthDataset, Period};
    use crate::stats::build_stats;

    fn view(dataset: MonthDataset) -> MonthView {
        MonthView {
            stats: build_stats(&dataset),
            dataset,
            sync_status: Some("Saved to cloud".to_string()),
            auth: AuthView {
                scope: Scope::Device,
                user_id: None,
                email: None,
                sign_in_available: false,
            },
        }
    }

    fn fresh() -> MonthDataset {
        MonthDataset::fresh(Period::new(2025, 2).unwrap())
    }

    #[test]
    fn renders_every_habit_and_day() {
        let dataset = MonthDataset::fresh(Period::new(2025, 2).unwrap());
        let html = render_index(&view(dataset.clone()));

        assert!(html.contains("<th>28</th>"));
        assert!(!html.contains("<th>29</th>"));
        for habit in &dataset.habits {
            assert!(html.contains(&format!(r#"name="habit_id" value="{}""#, habit.id)));
        }
        assert!(html.contains("Saved to cloud"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn escapes_user_text() {
        let mut dataset = MonthDataset::fresh(Period::new(2025, 2).unwrap());
        dataset.title = "<script>alert(1)</script>".to_string();
        let html = render_index(&view(dataset));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn sign_in_panel_follows_auth_state() {
        let mut page = view(fresh());
        let html = render_index(&page);
        assert!(html.contains("sign-in not configured"));
        assert!(!html.contains(r#"action="/auth/link""#));

        page.auth.sign_in_available = true;
        let html = render_index(&page);
        assert!(html.contains(r#"action="/auth/link""#));

        page.auth.scope = Scope::User;
        page.auth.email = Some("me@example.com".to_string());
        let html = render_index(&page);
        assert!(html.contains("me@example.com"));
        assert!(html.contains(r#"action="/auth/sign-out""#));
        assert!(!html.contains(r#"action="/auth/link""#));
    }

    #[test]
    fn page_forwards_link_token_and_offers_editing() {
        let dataset = fresh();
        let html = render_index(&view(dataset.clone()));

        assert!(html.contains("access_token"));
        assert!(html.contains("/api/auth/session"));
        assert!(html.contains(r#"action="/title""#));
        assert!(html.contains(r#"action="/habits""#));
        assert!(html.contains("import-file"));
        let first = &dataset.habits[0];
        assert!(html.contains(&format!(r#"action="/habits/{}/remove""#, first.id)));
        assert!(html.contains(REMOVE_HABIT_PROMPT));
        assert!(html.contains(r#"<option value="minutes">min</option>"#));
    }
}
