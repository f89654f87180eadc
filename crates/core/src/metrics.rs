//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `droptrack_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(droptrack_core::metrics::LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로세서 레이블 키 (bag_init, bag_modify, map_entry, map_exit, observer)
pub const LABEL_PROCESSOR: &str = "processor";

/// 로테이션 원인 레이블 키 (truncated, replaced)
pub const LABEL_ROTATION: &str = "cause";

// ─── Tailer 메트릭 ──────────────────────────────────────────────────

/// Tailer: 읽은 전체 라인 수 (counter)
pub const LINES_READ_TOTAL: &str = "droptrack_lines_read_total";

/// Tailer: 감지된 파일 로테이션 수 (counter, label: cause)
pub const ROTATIONS_TOTAL: &str = "droptrack_rotations_total";

/// Tailer: 파일 접근 실패 수 (counter)
pub const TAIL_ERRORS_TOTAL: &str = "droptrack_tail_errors_total";

/// Tailer: 현재 라인 번호 (gauge)
pub const CURRENT_LINE_NUMBER: &str = "droptrack_current_line_number";

// ─── Dispatcher 메트릭 ──────────────────────────────────────────────

/// Dispatcher: 프로세서별 매칭 수 (counter, label: processor)
pub const LINES_MATCHED_TOTAL: &str = "droptrack_lines_matched_total";

/// Dispatcher: 격리된 프로세서 실패 수 (counter, label: processor)
pub const HANDLER_FAILURES_TOTAL: &str = "droptrack_handler_failures_total";

// ─── Aggregator 메트릭 ──────────────────────────────────────────────

/// Aggregator: 발행된 드롭 이벤트 수 (counter)
pub const DROP_EVENTS_TOTAL: &str = "droptrack_drop_events_total";

/// Aggregator: 열린 맵 수 (counter)
pub const MAPS_OPENED_TOTAL: &str = "droptrack_maps_opened_total";

/// Aggregator: 닫힌 맵 수 (counter)
pub const MAPS_CLOSED_TOTAL: &str = "droptrack_maps_closed_total";

/// Aggregator: 다른 맵이 열린 상태에서 새 맵이 열린 수 (counter)
pub const MAPS_OVERLAPPING_TOTAL: &str = "droptrack_maps_overlapping_total";

/// Aggregator: 롤백된 변경 단계 수 (counter)
pub const ROLLBACKS_TOTAL: &str = "droptrack_rollbacks_total";

// ─── Notifier 메트릭 ────────────────────────────────────────────────

/// Notifier: 구독자 실패 수 (counter)
pub const SUBSCRIBER_FAILURES_TOTAL: &str = "droptrack_subscriber_failures_total";

/// Notifier: 현재 구독자 수 (gauge)
pub const SUBSCRIBERS: &str = "droptrack_subscribers";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `droptrack-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Tailer
    describe_counter!(LINES_READ_TOTAL, "Total number of lines read from the tailed file");
    describe_counter!(
        ROTATIONS_TOTAL,
        "Detected log rotations (truncated or replaced file)"
    );
    describe_counter!(
        TAIL_ERRORS_TOTAL,
        "Transient file access failures while tailing"
    );
    describe_gauge!(
        CURRENT_LINE_NUMBER,
        "Line number of the most recently delivered line"
    );

    // Dispatcher
    describe_counter!(LINES_MATCHED_TOTAL, "Lines matched per processor");
    describe_counter!(
        HANDLER_FAILURES_TOTAL,
        "Processor invocations that failed and were skipped"
    );

    // Aggregator
    describe_counter!(DROP_EVENTS_TOTAL, "Item drop events emitted");
    describe_counter!(MAPS_OPENED_TOTAL, "Maps opened on map entry lines");
    describe_counter!(MAPS_CLOSED_TOTAL, "Maps closed on map exit lines");
    describe_counter!(
        MAPS_OVERLAPPING_TOTAL,
        "Maps opened while another map was still open"
    );
    describe_counter!(ROLLBACKS_TOTAL, "Item modifications rolled back after a storage failure");

    // Notifier
    describe_counter!(
        SUBSCRIBER_FAILURES_TOTAL,
        "Subscriber callbacks that returned an error or panicked"
    );
    describe_gauge!(SUBSCRIBERS, "Currently registered change subscribers");
}
