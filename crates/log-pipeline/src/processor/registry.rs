//! 패턴 레지스트리 -- 우선순위 정렬 및 정규식 캐싱
//!
//! 생성 시 한 번만 정렬하고 컴파일하며, 이후에는 읽기 전용입니다.
//! 같은 패턴 문자열을 가진 프로세서들은 하나의 컴파일 결과를 공유합니다.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use super::Processor;
use crate::error::LogPipelineError;

/// 컴파일된 패턴이 연결된 프로세서
#[derive(Debug, Clone)]
pub struct RegisteredProcessor {
    /// 프로세서
    pub processor: Processor,
    /// 컴파일된 패턴 (`None`이면 모든 라인)
    pub regex: Option<Regex>,
}

/// 패턴 레지스트리
#[derive(Debug)]
pub struct PatternRegistry {
    /// 우선순위 오름차순 프로세서 목록
    entries: Vec<RegisteredProcessor>,
    /// 패턴 문자열 -> 컴파일된 정규식
    cache: HashMap<String, Regex>,
}

impl PatternRegistry {
    /// 프로세서 목록으로 레지스트리를 생성합니다.
    ///
    /// 우선순위가 같은 프로세서는 전달된 순서를 유지합니다.
    /// 패턴 하나라도 컴파일에 실패하면 에러를 반환합니다.
    pub fn new(mut processors: Vec<Processor>) -> Result<Self, LogPipelineError> {
        processors.sort_by_key(|p| p.order);

        let mut cache: HashMap<String, Regex> = HashMap::new();
        let mut entries = Vec::with_capacity(processors.len());

        for processor in processors {
            let regex = match &processor.pattern {
                Some(pattern) => Some(compile_cached(&mut cache, &processor, pattern)?),
                None => None,
            };
            entries.push(RegisteredProcessor { processor, regex });
        }

        tracing::debug!(
            processors = entries.len(),
            patterns = cache.len(),
            "pattern registry built"
        );

        Ok(Self { entries, cache })
    }

    /// 우선순위 순서의 프로세서 목록을 반환합니다.
    pub fn entries(&self) -> &[RegisteredProcessor] {
        &self.entries
    }

    /// 등록된 프로세서 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 서로 다른 컴파일된 패턴 수를 반환합니다.
    pub fn compiled_count(&self) -> usize {
        self.cache.len()
    }

    /// 프로세서 이름을 우선순위 순서대로 반환합니다.
    pub fn processor_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.processor.name()).collect()
    }
}

fn compile_cached(
    cache: &mut HashMap<String, Regex>,
    processor: &Processor,
    pattern: &str,
) -> Result<Regex, LogPipelineError> {
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| LogPipelineError::PatternCompile {
            processor: processor.name().to_owned(),
            reason: e.to_string(),
        })?;
    cache.insert(pattern.to_owned(), regex.clone());
    Ok(regex)
}
