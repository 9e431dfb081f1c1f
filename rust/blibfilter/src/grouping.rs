use crate::models::{
    IonKey,
    RefSpectrum,
};

/// All spectra of one peptide ion, in scan order.
#[derive(Debug, Clone)]
pub struct IonGroup {
    pub key: IonKey,
    pub members: Vec<RefSpectrum>,
}

impl IonGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Splits a stream of spectra sorted by ion into one [`IonGroup`] per ion.
///
/// A group is emitted as soon as a spectrum of a different ion shows up, or
/// the stream ends. The first spectrum of the next group is held back until
/// the following call. An error from the underlying stream is passed through
/// and ends the iteration.
///
/// # Example
///
/// ```
/// use blibfilter::grouping::IonGroups;
/// use blibfilter::models::RefSpectrum;
///
/// let spectra = [("AAA", 2), ("AAA", 2), ("AAB", 2)].map(|(seq, charge)| {
///     Ok::<_, ()>(RefSpectrum {
///         peptide_mod_seq: seq.to_string(),
///         precursor_charge: charge,
///         ..Default::default()
///     })
/// });
/// let sizes: Vec<usize> = IonGroups::new(spectra.into_iter())
///     .map(|g| g.unwrap().len())
///     .collect();
/// assert_eq!(sizes, vec![2, 1]);
/// ```
pub struct IonGroups<I> {
    inner: I,
    next_first: Option<RefSpectrum>,
    done: bool,
}

impl<I> IonGroups<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            next_first: None,
            done: false,
        }
    }
}

impl<I, E> Iterator for IonGroups<I>
where
    I: Iterator<Item = Result<RefSpectrum, E>>,
{
    type Item = Result<IonGroup, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.next_first.take() {
            Some(x) => x,
            None => match self.inner.next() {
                Some(Ok(x)) => x,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            },
        };

        let key = first.ion_key();
        let mut members = vec![first];
        loop {
            match self.inner.next() {
                Some(Ok(spectrum)) if spectrum.belongs_to(&key) => members.push(spectrum),
                Some(Ok(spectrum)) => {
                    self.next_first = Some(spectrum);
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        Some(Ok(IonGroup { key, members }))
    }
}
