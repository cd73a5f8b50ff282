pub const SCHEMA_FACTS_HEADER: &str = "SCHEMA (STRICT):";

pub const SCHEMA_STRICT_TEXT: &str = "SCHEMA (STRICT):
- tables: users, event
- join: event.protectee_id = users.id
- users columns: id INTEGER PRIMARY KEY, name TEXT NOT NULL
- event columns: id INTEGER PRIMARY KEY, protectee_id INTEGER NOT NULL, timestamp TEXT NOT NULL, ppg_json TEXT, ppg_threat_detected INTEGER, hrv INTEGER, stress INTEGER, imu_danger_level INTEGER, latitude REAL, longitude REAL, zone_type TEXT, is_watch_connected INTEGER

COLUMN NOTES (DO NOT INVENT NEW COLUMNS):
- users.id: 사용자 PK (INTEGER)
- users.name: 사용자 이름 (TEXT)
- event.id: 이벤트 PK (INTEGER)
- event.protectee_id: users.id FK (INTEGER)
- event.timestamp: 이벤트 시각 (TEXT, 'YYYY-MM-DD HH:MM:SS')
- event.ppg_json: PPG 값 배열(JSON 문자열)
- event.ppg_threat_detected: PPG 기반 위협 퍼센트(정수, %)
- event.hrv: HRV 지수(정수)
- event.stress: 스트레스 지수(정수)
- event.imu_danger_level: 움직임/자세 불안정 지표(정수)
- event.latitude: 위도(REAL)
- event.longitude: 경도(REAL)
- event.zone_type: 구역 종류('safe' 또는 'unfamiliar')
- event.is_watch_connected: 워치 연결 상태(1=연결, 0=끊김)

SEMANTICS:
- e.stress: 심리·생리적 스트레스 강도(클수록 높음)
- e.hrv: 심박 변이 지수(HRV)
- e.imu_danger_level: 움직임/균형 불안정, 넘어짐/흔들림 위험도(클수록 높음)
- e.ppg_threat_detected: PPG 센서 기반 생체신호 위협도(0~100%, 클수록 위험/불안정)

RULES:
- Use ONLY these tables/columns. NEVER invent tables or columns.
- Always fully-qualify columns using aliases: event AS e, users AS u.
- Filter by user name via JOIN (u.id = e.protectee_id AND u.name = ...).
- For 'highest/최고/가장 높', ORDER BY the TARGET METRIC column DESC, then e.timestamp DESC.
- For '낯선 장소/unfamiliar' add WHERE e.zone_type = 'unfamiliar'; for 'safe' add WHERE e.zone_type = 'safe'.
- Output ONLY a single SQLite SELECT (no DDL/DML, no commentary).
";
