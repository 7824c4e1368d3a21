use crate::{
    common::TextUnit,
    error::{Error, Result},
};

/// Batch number of the line at `line_index`.
pub fn batch_of(line_index: usize, batch_size: usize) -> usize {
    line_index / batch_size
}

/// Splits `lines` into units of `batch_size` consecutive lines.
pub fn batch<I, S>(lines: I, batch_size: usize) -> Result<Vec<TextUnit>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(batches(lines, batch_size)?.collect())
}

/// Lazy form of [`batch`]; the input is consumed once.
pub fn batches<I, S>(lines: I, batch_size: usize) -> Result<Batches<I::IntoIter>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if batch_size == 0 {
        return Err(Error::InvalidArgument(
            "batch size must be at least 1".to_string(),
        ));
    }
    Ok(Batches {
        lines: lines.into_iter(),
        batch_size,
        next_unit: 0,
        next_line: 0,
    })
}

pub struct Batches<I> {
    lines: I,
    batch_size: usize,
    next_unit: usize,
    next_line: usize,
}

impl<I, S> Iterator for Batches<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = TextUnit;

    fn next(&mut self) -> Option<TextUnit> {
        let mut text = String::new();
        let mut taken = 0;
        for line in self.lines.by_ref().take(self.batch_size) {
            text.push_str(line.as_ref());
            taken += 1;
        }
        if taken == 0 {
            return None;
        }

        let unit = TextUnit {
            index: self.next_unit,
            lines: self.next_line..self.next_line + taken,
            text,
        };
        self.next_unit += 1;
        self.next_line += taken;
        Some(unit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = self.lines.size_hint();
        (
            low.div_ceil(self.batch_size),
            high.map(|h| h.div_ceil(self.batch_size)),
        )
    }
}
